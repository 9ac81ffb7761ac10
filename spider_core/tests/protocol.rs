use rstest::rstest;
use spider_core::mocks::MockTransport;
use spider_core::ServoLink;

const SYNC: u8 = 0xAA;
const DEVICE_A: u8 = 0x0C;
const DEVICE_B: u8 = 0x0D;

#[test]
fn set_position_encodes_quarter_microseconds() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    link.set_position(3, 1500).unwrap();

    let writes = transport.writes();
    assert_eq!(writes.len(), 1);
    // 1500 us -> 6000 quarter-us -> 7-bit split lo 0x70, hi 0x2E.
    assert_eq!(writes[0], vec![SYNC, DEVICE_A, 0x04, 3, 0x70, 0x2E]);
}

#[test]
fn channels_above_eleven_address_the_second_device() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    link.set_position(12, 1500).unwrap();
    link.set_speed(23, 100).unwrap();

    let writes = transport.writes();
    assert_eq!(writes[0][1], DEVICE_B);
    assert_eq!(writes[0][3], 0);
    assert_eq!(writes[1][1], DEVICE_B);
    assert_eq!(writes[1][3], 11);
}

#[rstest]
#[case(735)]
#[case(2273)]
#[case(-1)]
fn out_of_range_pulse_is_rejected_before_transmission(#[case] pulse: i32) {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    assert!(link.set_position(0, pulse).is_err());
    assert!(transport.writes().is_empty());
}

#[test]
fn zero_pulse_means_servo_off_and_is_accepted() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    link.set_position(0, 0).unwrap();
    assert_eq!(transport.writes().len(), 1);
}

#[test]
fn straddling_batch_splits_at_the_device_boundary() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    let pulses: Vec<i32> = (0..4).map(|i| 1000 + i * 100).collect();
    link.set_multiple(10, &pulses).unwrap();

    let writes = transport.writes();
    assert_eq!(writes.len(), 2);
    // Channels 10-11 on device A, 12-13 re-indexed to 0-1 on device B.
    assert_eq!(&writes[0][..5], &[SYNC, DEVICE_A, 0x1F, 2, 10]);
    assert_eq!(&writes[1][..5], &[SYNC, DEVICE_B, 0x1F, 2, 0]);
}

#[test]
fn rejected_batch_transmits_nothing_even_when_first_half_is_valid() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    // Valid device-A half, invalid value in the device-B half.
    let pulses = [1500, 1500, 1500, 9999];
    assert!(link.set_multiple(10, &pulses).is_err());
    assert!(transport.writes().is_empty());
}

#[test]
fn batch_past_channel_24_is_rejected() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    let pulses = [1500; 5];
    assert!(link.set_multiple(20, &pulses).is_err());
    assert!(transport.writes().is_empty());
}

#[test]
fn get_position_decodes_little_endian_reply() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    // 1500 us -> 6000 quarter-us -> 0x1770.
    transport.push_read(&[0x70, 0x17]);
    assert_eq!(link.get_position(5).unwrap(), Some(1500));
}

#[test]
fn short_or_desynchronized_position_reply_reads_as_none() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    assert_eq!(link.get_position(5).unwrap(), None);

    transport.push_read(&[0x70, 0xFF]);
    assert_eq!(link.get_position(5).unwrap(), None);
}

#[test]
fn get_moving_queries_both_devices() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    // Device A idle, device B still moving.
    transport.push_read(&[0, 1]);
    assert!(link.get_moving().unwrap());

    let queries = transport.frames_with_command(0x13);
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0][1], DEVICE_A);
    assert_eq!(queries[1][1], DEVICE_B);
}

#[test]
fn go_home_addresses_both_devices() {
    let transport = MockTransport::new();
    let mut link = ServoLink::new(transport.clone());
    link.go_home().unwrap();
    let frames = transport.frames_with_command(0x22);
    assert_eq!(frames.len(), 2);
}
