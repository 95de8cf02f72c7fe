#![no_main]

use libfuzzer_sys::fuzz_target;

use quickpoll::polls::config::{split_options, validate_voter_name};
use quickpoll::polls::{NewPoll, PollLimits};

fuzz_target!(|data: &str| {
    let limits = PollLimits::default();
    let (question, options) = data.split_once('\n').unwrap_or((data, ""));

    let split = split_options(options);
    assert!(split.iter().all(|o| !o.is_empty() && o.trim() == o));

    if let Ok(poll) = NewPoll::parse(question, options, &limits) {
        assert!(!poll.question.is_empty());
        assert!(poll.options.len() >= 2 && poll.options.len() <= limits.max_options);
        assert_eq!(poll.options, split);
    }

    if let Ok(name) = validate_voter_name(data, &limits) {
        assert!(!name.is_empty());
        assert!(name.chars().count() <= limits.max_name_len);
    }
});
