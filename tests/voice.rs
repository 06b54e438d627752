//! Voice pipeline integration tests
//!
//! Tests utterance segmentation and audio encoding without requiring audio
//! hardware

use std::io::Cursor;

use voicebill::capture::{DetectorState, UtteranceDetector, calculate_energy};
use voicebill::voice::{SAMPLE_RATE, decode_mp3, samples_to_wav};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_detector_starts_waiting() {
    let detector = UtteranceDetector::new();
    assert_eq!(detector.state(), DetectorState::Waiting);
    assert!(detector.speech_secs().abs() < f32::EPSILON);
}

#[test]
fn test_speech_then_silence_completes_utterance() {
    let mut detector = UtteranceDetector::new();

    assert_eq!(detector.process(&generate_silence(0.1)), DetectorState::Waiting);

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    assert_eq!(detector.process(&speech), DetectorState::Speaking);
    assert!((detector.speech_secs() - 0.5).abs() < 0.01);

    assert_eq!(detector.process(&generate_silence(0.6)), DetectorState::Complete);
}

#[test]
fn test_chunked_stream_completes_after_trailing_silence() {
    let mut detector = UtteranceDetector::new();

    for _ in 0..5 {
        detector.process(&generate_sine_samples(300.0, 0.1, 0.3));
    }
    assert_eq!(detector.state(), DetectorState::Speaking);

    // 0.5s of silence is not yet enough
    for _ in 0..5 {
        assert_eq!(
            detector.process(&generate_silence(0.1)),
            DetectorState::Speaking
        );
    }

    assert_eq!(detector.process(&generate_silence(0.1)), DetectorState::Complete);
}

#[test]
fn test_pause_inside_utterance_does_not_end_it() {
    let mut detector = UtteranceDetector::new();

    detector.process(&generate_sine_samples(440.0, 0.4, 0.3));
    detector.process(&generate_silence(0.3));
    assert_eq!(
        detector.process(&generate_sine_samples(440.0, 0.4, 0.3)),
        DetectorState::Speaking
    );
    assert_eq!(detector.process(&generate_silence(0.6)), DetectorState::Complete);
}

#[test]
fn test_short_noise_is_discarded() {
    let mut detector = UtteranceDetector::new();

    detector.process(&generate_sine_samples(440.0, 0.1, 0.3));
    assert_eq!(detector.process(&generate_silence(0.6)), DetectorState::Waiting);
    assert!(detector.take_speech().is_empty());
}

#[test]
fn test_take_speech_returns_utterance_and_resets() {
    let mut detector = UtteranceDetector::new();

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    let silence = generate_silence(0.6);
    detector.process(&speech);
    detector.process(&silence);

    let taken = detector.take_speech();
    assert_eq!(taken.len(), speech.len() + silence.len());
    assert_eq!(detector.state(), DetectorState::Waiting);
    assert!(detector.take_speech().is_empty());
}

#[test]
fn test_take_speech_mid_utterance() {
    let mut detector = UtteranceDetector::new();

    let chunk1 = generate_sine_samples(440.0, 0.1, 0.3);
    let chunk2 = generate_sine_samples(440.0, 0.1, 0.3);
    detector.process(&chunk1);
    detector.process(&chunk2);

    // phrase limit cut-off keeps what was heard so far
    assert_eq!(detector.take_speech().len(), chunk1.len() + chunk2.len());
}

#[test]
fn test_energy_of_sine() {
    let tone = generate_sine_samples(440.0, 0.1, 0.5);
    let energy = calculate_energy(&tone);

    // RMS of a sine is amplitude / sqrt(2)
    assert!((energy - 0.5 / 2.0_f32.sqrt()).abs() < 0.01);
    assert!(calculate_energy(&[]).abs() < f32::EPSILON);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // header plus 16-bit samples
    assert!(wav_data.len() >= 44 + samples.len() * 2);
}

#[test]
fn test_wav_readback() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[0], 0);
    assert!(read_samples[3] > 32000);
    assert!(read_samples[4] < -32000);
}

#[test]
fn test_decode_rejects_non_mp3() {
    assert!(decode_mp3(b"definitely not an mp3 stream").is_err());
}
