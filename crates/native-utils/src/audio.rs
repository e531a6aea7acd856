use base64::Engine;
use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree};

/// Sample rate of the PCM16 audio returned by the speech endpoint.
pub const SPEECH_PCM16_SAMPLE_RATE: f64 = 24000.0;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits a slice of audio samples into a vector of vectors, where each inner vector has a fixed chunk size.
/// If a chunk is smaller than the `chunk_size`, it is padded with zeros.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Decodes a base64 string representing PCM16 audio into a vector of f32 samples.
/// The function converts the string to a binary vector of u8, interprets chunks as i16 values,
/// and then normalizes them to f32 values between -1.0 and 1.0.
pub fn decode_f32(base64_fragment: &str) -> Vec<f32> {
    if let Ok(pcm16) = base64::engine::general_purpose::STANDARD.decode(base64_fragment) {
        pcm16
            .chunks_exact(2)
            .map(|chunk| {
                let v = i16::from_le_bytes([chunk[0], chunk[1]]);
                (v as f32 / 32768.0).clamp(-1.0, 1.0)
            })
            .collect()
    } else {
        tracing::error!("Failed to decode base64 fragment");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pcm16_little_endian_into_normalized_samples() {
        // 0, i16::MAX, i16::MIN as little-endian bytes.
        let bytes: Vec<u8> = [0i16, i16::MAX, i16::MIN]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let samples = decode_f32(&encoded);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (i16::MAX as f32 / 32768.0)).abs() < 1e-6);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn invalid_base64_decodes_to_nothing() {
        assert!(decode_f32("not base64!!!").is_empty());
    }

    #[test]
    fn chunks_are_padded_to_full_size() {
        let samples = vec![0.5; 5];
        let chunks = split_for_chunks(&samples, 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], vec![0.5; 4]);
        assert_eq!(chunks[1], vec![0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn resampler_accepts_the_configured_chunk_size() {
        use rubato::Resampler;
        let mut resampler = create_resampler(24000.0, 48000.0, 1024).unwrap();
        let out = resampler.process(&[vec![0.0f32; 1024]], None).unwrap();
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_empty());
    }
}
