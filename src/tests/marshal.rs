use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::mock::{MockEngine, captured_value, duplex_params, input_only, output_only};
use crate::host::native::{CALLBACK_CONTINUE, RawTimeInfo};
use crate::{
    ChannelLayout, Engine, Int24, Interleaved, NonInterleaved, Sample, SampleEncoding,
    StatusFlags, TimeInfo,
};

fn engine() -> (MockEngine, Engine<MockEngine>) {
    let mock = MockEngine::new();
    let engine = Engine::initialize(mock.clone()).expect("initialized");
    (mock, engine)
}

#[test]
fn duplex_passthrough_sees_engine_buffers() {
    let (mock, engine) = engine();
    let callback = |input: &mut Interleaved<f32>, output: &mut Interleaved<f32>| {
        output.copy_from_slice(input);
    };
    let mut stream = engine
        .open_stream(&duplex_params(2, 2), callback)
        .expect("opened");
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    let block = mock.fire_block(id, 4).expect("fired");
    assert_eq!(block.code, CALLBACK_CONTINUE);
    let expected: Vec<f32> = (0..4)
        .flat_map(|frame| (0..2).map(move |ch| captured_value(frame, ch) as f32))
        .collect();
    assert_eq!(block.samples::<f32>(), expected);

    let request = mock.last_opened().expect("recorded");
    let input = request.input.expect("input side");
    assert_eq!(input.encoding, SampleEncoding::Float32);
    assert_eq!(input.layout, ChannelLayout::Interleaved);
    assert_eq!(input.device, 2);
}

#[test]
fn non_interleaved_generator_writes_each_channel() {
    let (mock, engine) = engine();
    let callback = |output: &mut NonInterleaved<i16>| {
        for (ch, channel) in output.iter_mut().enumerate() {
            for (i, sample) in channel.iter_mut().enumerate() {
                *sample = (ch * 10 + i) as i16;
            }
        }
    };
    let mut stream = engine.open_stream(&output_only(2), callback).expect("opened");
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    let block = mock.fire_block(id, 3).expect("fired");
    assert_eq!(block.samples::<i16>(), vec![0, 10, 1, 11, 2, 12]);
    assert_eq!(
        mock.last_opened().and_then(|r| r.output).map(|o| o.layout),
        Some(ChannelLayout::NonInterleaved)
    );
}

#[test]
fn packed_24_bit_input_is_decoded() {
    let (mock, engine) = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = move |input: &mut Interleaved<Int24>| {
        sink.lock().extend(input.iter().map(|s| s.to_i32()));
    };
    let mut stream = engine.open_stream(&input_only(1), callback).expect("opened");
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    mock.fire_block(id, 3).expect("fired");
    mock.fire_block(id, 2).expect("fired");
    assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    assert!(mock.fire_block(id, 2).expect("fired").output.is_empty());
}

#[test]
fn time_info_and_flags_are_delivered_when_declared() {
    let (mock, engine) = engine();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let callback = move |_input: &mut Interleaved<f32>,
                         output: &mut Interleaved<f32>,
                         time: &TimeInfo,
                         flags: StatusFlags| {
        output.fill(0.0);
        *sink.lock() = Some((*time, flags));
    };
    let mut stream = engine.open_stream(&output_only(2), callback).expect("opened");
    assert!(stream.format().time_info);
    assert!(stream.format().status_flags);
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    let raw = RawTimeInfo {
        input_buffer_adc_time: 1.5,
        current_time: 2.0,
        output_buffer_dac_time: -1.0,
    };
    mock.fire(id, 8, raw, 0x04 | 0x10).expect("fired");
    let (time, flags) = seen.lock().take().expect("called");
    assert_eq!(time.input_buffer_adc_time, Duration::from_millis(1500));
    assert_eq!(time.current_time, Duration::from_secs(2));
    assert_eq!(time.output_buffer_dac_time, Duration::ZERO);
    assert_eq!(flags, StatusFlags::OUTPUT_UNDERFLOW | StatusFlags::PRIMING_OUTPUT);
}

#[test]
fn views_follow_the_block_size() {
    let (mock, engine) = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = move |input: &mut NonInterleaved<u8>, output: &mut Interleaved<u8>| {
        sink.lock().push((input.channels(), input.frames(), output.frames()));
        output.fill(128);
    };
    let mut stream = engine
        .open_stream(&duplex_params(3, 1), callback)
        .expect("opened");
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    for frames in [16, 5, 1] {
        let block = mock.fire_block(id, frames).expect("fired");
        assert_eq!(block.output, vec![128u8; frames]);
    }
    assert_eq!(*seen.lock(), vec![(3, 16, 16), (3, 5, 5), (3, 1, 1)]);
}

#[test]
fn stopped_streams_receive_no_blocks() {
    let (mock, engine) = engine();
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let callback = move |out: &mut Interleaved<i32>| {
        out.fill(0);
        *counter.lock() += 1;
    };
    let mut stream = engine.open_stream(&output_only(1), callback).expect("opened");
    let id = mock.last_stream().expect("native stream");
    assert!(mock.fire_block(id, 4).is_err());

    stream.start().expect("start");
    mock.fire_block(id, 4).expect("fired");
    stream.stop().expect("stop");
    assert!(mock.fire_block(id, 4).is_err());
    assert_eq!(*calls.lock(), 1);
}

#[test]
fn swapped_views_stay_within_the_engine_buffers() {
    let (mock, engine) = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = move |input: &mut Interleaved<f32>, output: &mut Interleaved<f32>| {
        sink.lock()
            .push((input.len(), input.channels(), output.len(), output.channels()));
        output.fill(0.0);
        std::mem::swap(input, output);
    };
    let mut stream = engine
        .open_stream(&duplex_params(1, 2), callback)
        .expect("opened");
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    for _ in 0..3 {
        let block = mock.fire_block(id, 4).expect("fired");
        assert_eq!(block.output.len(), 4 * 2 * 4);
    }
    assert_eq!(*seen.lock(), vec![(4, 1, 8, 2); 3]);
}

/// Opens a 3-in/2-out duplex stream with interleaved `T` views and fires one 16-frame block.
fn marshal_interleaved<T: Sample>() {
    let (mock, engine) = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = move |input: &mut Interleaved<T>, output: &mut Interleaved<T>| {
        sink.lock().push((input.len(), input.frames(), output.len(), output.frames()));
        output.fill_silence();
    };
    let mut stream = engine
        .open_stream(&duplex_params(3, 2), callback)
        .expect("opened");
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    let block = mock.fire_block(id, 16).expect("fired");
    assert_eq!(*seen.lock(), vec![(16 * 3, 16, 16 * 2, 16)], "{}", T::ENCODING);
    assert_eq!(block.output, bytemuck::bytes_of(&T::EQUILIBRIUM).repeat(16 * 2));

    let request = mock.last_opened().expect("recorded");
    let output = request.output.expect("output side");
    assert_eq!(output.encoding, T::ENCODING);
    assert_eq!(output.layout, ChannelLayout::Interleaved);
}

/// Same stream shape with one buffer per channel.
fn marshal_non_interleaved<T: Sample>() {
    let (mock, engine) = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = move |input: &mut NonInterleaved<T>, output: &mut NonInterleaved<T>| {
        let lengths = |view: &NonInterleaved<T>| view.iter().map(<[T]>::len).collect::<Vec<_>>();
        sink.lock().push((lengths(&*input), lengths(&*output)));
        output.fill_silence();
    };
    let mut stream = engine
        .open_stream(&duplex_params(3, 2), callback)
        .expect("opened");
    stream.start().expect("start");
    let id = mock.last_stream().expect("native stream");

    let block = mock.fire_block(id, 16).expect("fired");
    assert_eq!(*seen.lock(), vec![(vec![16; 3], vec![16; 2])], "{}", T::ENCODING);
    assert_eq!(block.output, bytemuck::bytes_of(&T::EQUILIBRIUM).repeat(16 * 2));

    let request = mock.last_opened().expect("recorded");
    let input = request.input.expect("input side");
    assert_eq!(input.encoding, T::ENCODING);
    assert_eq!(input.layout, ChannelLayout::NonInterleaved);
}

#[test]
fn every_encoding_and_layout_is_marshaled() {
    marshal_interleaved::<f32>();
    marshal_interleaved::<i32>();
    marshal_interleaved::<Int24>();
    marshal_interleaved::<i16>();
    marshal_interleaved::<i8>();
    marshal_interleaved::<u8>();

    marshal_non_interleaved::<f32>();
    marshal_non_interleaved::<i32>();
    marshal_non_interleaved::<Int24>();
    marshal_non_interleaved::<i16>();
    marshal_non_interleaved::<i8>();
    marshal_non_interleaved::<u8>();
}

