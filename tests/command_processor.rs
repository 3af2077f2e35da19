// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

#[cfg(test)]
mod tests
{
	use swsbridge::command::{BANNER, CommandProcessor};
	use swsbridge::config::BridgeConfig;
	use swsbridge::host::StreamLink;
	use swsbridge::sws::sim::{SimResetLine, SimTransport, SimulatedTarget};
	use swsbridge::sws::{ConnectStrategy, TaggedCodec, Target, TargetState};

	type SimProcessor = CommandProcessor<TaggedCodec<SimTransport>, SimResetLine>;

	fn processor(simulated: &SimulatedTarget) -> SimProcessor
	{
		let config = BridgeConfig {
			transfer_timeout_ms: 5,
			reset_hold_ms: 0,
			..BridgeConfig::default()
		};
		let target = Target::new(TaggedCodec::new(simulated.transport(), &config), simulated.reset_line(), &config);
		CommandProcessor::new(target, ConnectStrategy::default())
	}

	/// Feed `input` to the processor until it runs dry, returning everything after the banner
	fn session(processor: &mut SimProcessor, input: &str) -> String
	{
		let mut link = StreamLink::new(input.as_bytes(), Vec::new());
		while processor.poll(&mut link) {}
		let (_, output) = link.into_parts();
		let output = String::from_utf8(output).expect("responses are ASCII");
		output
			.strip_prefix(BANNER)
			.expect("a new host is greeted with the banner")
			.to_string()
	}

	#[test]
	fn read_streams_hex_then_success()
	{
		let simulated = SimulatedTarget::new();
		simulated.load(0x0010, &[0xde, 0xad, 0xbe, 0xef]);
		let mut processor = processor(&simulated);
		assert_eq!(session(&mut processor, "i"), "S\n");
		simulated.clear_frames();

		assert_eq!(session(&mut processor, "R00100004"), "deadbeef\nS\n");
		assert_eq!(simulated.open_count(), 1);
	}

	#[test]
	fn write_then_read_back()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);

		assert_eq!(session(&mut processor, "iW0010000312AbcdR00100003"), "S\nS\n12abcd\nS\n");
		assert_eq!(simulated.memory(0x0010, 3), [0x12, 0xab, 0xcd]);
	}

	#[test]
	fn zero_length_read_skips_the_wire()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);
		session(&mut processor, "i");
		simulated.clear_frames();

		assert_eq!(session(&mut processor, "R00100000"), "S\n");
		assert!(simulated.frames().is_empty());
	}

	#[test]
	fn connect_reports_identity_failure()
	{
		let simulated = SimulatedTarget::new().with_soc_id(0x1234);
		let mut processor = processor(&simulated);

		assert_eq!(session(&mut processor, "i"), "E\n# init failed\n");
		assert!(!processor.target().is_connected());
	}

	#[test]
	fn reset_low_drops_connection_but_reads_still_run()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);

		assert_eq!(session(&mut processor, "ir0"), "S\nS\n");
		assert_eq!(processor.target().state(), TargetState::Disconnected);

		// Not connected, yet `s` still goes out on the wire
		assert_eq!(session(&mut processor, "r1s"), "S\n# socid = 5316\nS\n");
		assert!(!processor.target().is_connected());
	}

	#[test]
	fn read_while_held_in_reset_times_out()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);

		assert_eq!(session(&mut processor, "s"), "E\n# target not responding\n");
		assert_eq!(session(&mut processor, "R007e0002"), "\nE\n# target not responding\n");
	}

	#[test]
	fn go_pulses_reset()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);
		session(&mut processor, "i");
		let resets = simulated.reset_count();

		assert_eq!(session(&mut processor, "g"), "S\n");
		assert_eq!(simulated.reset_count(), resets + 1);
		assert_eq!(processor.target().state(), TargetState::Disconnected);
		assert!(simulated.is_released());
	}

	#[test]
	fn unknown_command_leaves_state_alone()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);
		session(&mut processor, "i");
		simulated.clear_frames();

		assert_eq!(session(&mut processor, "x"), "?\n# unknown command\n");
		assert!(processor.target().is_connected());
		assert!(simulated.frames().is_empty());
	}

	#[test]
	fn malformed_payloads_are_rejected_before_the_wire()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);
		session(&mut processor, "i");
		simulated.clear_frames();

		assert_eq!(session(&mut processor, "R00zz0004"), "E\n# malformed payload\n");
		assert_eq!(session(&mut processor, "W001000021g00"), "E\n# malformed payload\n");
		assert_eq!(session(&mut processor, "W0010000212zz"), "E\n# malformed payload\n");
		assert_eq!(session(&mut processor, "r2"), "E\n# malformed payload\n");
		assert!(simulated.frames().is_empty());
		assert_eq!(simulated.memory(0x0010, 2), [0, 0]);
	}

	#[test]
	fn truncated_payload_gets_no_response()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);

		assert_eq!(session(&mut processor, "R0010"), "");
	}

	#[test]
	fn banner_on_attach_and_on_request()
	{
		let simulated = SimulatedTarget::new();
		let mut processor = processor(&simulated);

		let output = session(&mut processor, "x?");
		assert_eq!(output, format!("?\n# unknown command\n{}", BANNER));
		assert_eq!(session(&mut processor, ""), "");
	}
}
