use crate::sim::SimTime;

#[test]
fn sim_time_unit_conversions() {
    assert_eq!(SimTime::from_micros(1), SimTime(1_000));
    assert_eq!(SimTime::from_millis(1), SimTime(1_000_000));
    assert_eq!(SimTime::from_secs(1), SimTime(1_000_000_000));
}

#[test]
fn sim_time_unit_conversions_saturate_on_overflow() {
    assert_eq!(SimTime::from_micros(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime::from_millis(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime::from_secs(u64::MAX), SimTime(u64::MAX));
}

#[test]
fn change_log_timestamps_truncate_to_millis() {
    assert_eq!(SimTime(1_999_999).as_millis(), 1);
    assert_eq!(SimTime::from_secs(3).as_millis(), 3_000);
}

#[test]
fn fractional_seconds_round_to_nanos_and_clamp_negative() {
    assert_eq!(SimTime::from_secs_f64(0.001_834), SimTime(1_834_000));
    assert_eq!(SimTime::from_secs_f64(-1.0), SimTime::ZERO);
}
