use proptest::prelude::*;
use spider_core::fusion::median_lower;
use spider_core::protocol::{
    device_for, local_channel_for, split_7bit, CHANNELS_PER_DEVICE, DEVICE_A, PULSE_MAX, PULSE_MIN,
};
use spider_core::time_to_speed_accel;

proptest! {
    // For a fixed duration a longer move needs a faster profile; the
    // planner must never hand a longer move a slower speed.
    #[test]
    fn longer_moves_get_faster_profiles(
        duration_ms in 100u64..10_000,
        distance in 1i32..1400,
        extra in 1i32..136,
    ) {
        let (near_speed, _) = time_to_speed_accel(duration_ms, distance, 0.0).unwrap();
        let (far_speed, _) = time_to_speed_accel(duration_ms, distance + extra, 0.0).unwrap();
        prop_assert!(far_speed >= near_speed,
            "distance {} speed {} vs distance {} speed {}",
            distance, near_speed, distance + extra, far_speed);
    }

    // Every profile the planner emits must survive the 7-bit command
    // encoding: nonzero and within 14 bits.
    #[test]
    fn profiles_are_always_encodable(
        duration_ms in 1u64..60_000,
        distance in -1536i32..=1536,
    ) {
        let (speed, accel) = time_to_speed_accel(duration_ms, distance, 0.0).unwrap();
        prop_assert!(speed >= 1 && speed <= 0x3FFF);
        prop_assert!(accel >= 1 && accel <= 0x3FFF);
        let [s_lo, s_hi] = split_7bit(speed);
        let [a_lo, a_hi] = split_7bit(accel);
        prop_assert_eq!(u16::from(s_lo) | (u16::from(s_hi) << 7), speed);
        prop_assert_eq!(u16::from(a_lo) | (u16::from(a_hi) << 7), accel);
    }

    // The median must not care about sample arrival order.
    #[test]
    fn median_is_order_independent(
        samples in prop::collection::vec(0f32..800.0, 1..32),
        rotate in 0usize..32,
    ) {
        let mut original = samples.clone();
        let mut rotated = samples;
        let len = rotated.len();
        rotated.rotate_left(rotate % len);
        prop_assert_eq!(median_lower(&mut original), median_lower(&mut rotated));
    }

    // Quarter-microsecond position payloads round-trip through the
    // 7-bit split for the whole legal pulse range.
    #[test]
    fn position_payloads_round_trip(pulse in PULSE_MIN..=PULSE_MAX) {
        let quarter_us = (pulse * 4) as u16;
        let [lo, hi] = split_7bit(quarter_us);
        prop_assert!(lo < 0x80 && hi < 0x80);
        prop_assert_eq!(u16::from(lo) | (u16::from(hi) << 7), quarter_us);
    }

    // Logical channels partition cleanly across the two devices.
    #[test]
    fn channel_partition_round_trips(channel in 0u8..24) {
        let local = local_channel_for(channel);
        prop_assert!(local < CHANNELS_PER_DEVICE);
        let recombined = if device_for(channel) == DEVICE_A {
            local
        } else {
            local + CHANNELS_PER_DEVICE
        };
        prop_assert_eq!(recombined, channel);
    }
}
