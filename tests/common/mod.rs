// Shared helpers for integration tests.
//
// Env knobs:
// - PROPTEST_CASES: number of cases per property (default 32).
// - PROPTEST_MAX_SHRINK_MS: optional cap for shrinking time in milliseconds.

#![allow(dead_code)]

use court_queue::{Participant, Session, SessionRules};

pub fn proptest_prelude_config() -> proptest::prelude::ProptestConfig {
    let base: proptest::prelude::ProptestConfig = proptest::prelude::ProptestConfig::default();

    let cases_env: Option<u32> = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok());
    let cases: u32 = cases_env.unwrap_or(32).max(1);

    let max_shrink_time_env: Option<u32> = std::env::var("PROPTEST_MAX_SHRINK_MS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok());
    let max_shrink_time: u32 = max_shrink_time_env.unwrap_or(base.max_shrink_time);

    proptest::prelude::ProptestConfig {
        // Disable persistence to silence regression-file warnings in integration tests
        failure_persistence: None,
        cases,
        max_shrink_time,
        ..base
    }
}

/// 建立一個預備場地 + 1 號場地的場次，並依序加入參與者
pub fn session_with_roster(rules: SessionRules, ids: &[&str]) -> Session {
    ids.iter().fold(Session::with_courts(rules, 1, 1), |session, id| {
        session
            .join(Participant::new(*id, id.to_uppercase()))
            .expect("fresh ids join cleanly")
    })
}
