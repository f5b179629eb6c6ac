//! Provider pricing and cost calculation.
//!
//! Prices are per unit as published by the providers; DKK conversion uses the
//! configured exchange rate, not a live one.

/// Whisper: $0.006 per minute of audio.
pub const WHISPER_PER_MINUTE: f64 = 0.006;

/// Text model: per million tokens.
pub const TEXT_INPUT_PER_MILLION: f64 = 0.50;
pub const TEXT_OUTPUT_PER_MILLION: f64 = 1.00;

/// Image model: token prices plus a flat per-image price by resolution.
pub const IMAGE_INPUT_PER_MILLION: f64 = 2.00;
pub const IMAGE_OUTPUT_PER_MILLION: f64 = 12.00;
pub const IMAGE_OUTPUT_1K_2K: f64 = 0.134;
pub const IMAGE_OUTPUT_4K: f64 = 0.24;

/// Cost in USD of transcribing `duration_seconds` of audio.
pub fn whisper_cost(duration_seconds: f64) -> f64 {
    let minutes = duration_seconds.max(0.0) / 60.0;
    minutes * WHISPER_PER_MINUTE
}

/// Cost in USD of a text-generation call.
pub fn text_generation_cost(input_tokens: i64, output_tokens: i64) -> f64 {
    let input = (input_tokens.max(0) as f64 / 1_000_000.0) * TEXT_INPUT_PER_MILLION;
    let output = (output_tokens.max(0) as f64 / 1_000_000.0) * TEXT_OUTPUT_PER_MILLION;
    input + output
}

/// Cost in USD of an image-generation call: token cost plus a per-image
/// price. 1k and 2k share a price point; 4k is billed higher.
pub fn image_generation_cost(
    input_tokens: i64,
    output_tokens: i64,
    images_generated: i64,
    resolution: &str,
) -> f64 {
    let per_image = match resolution.to_ascii_lowercase().as_str() {
        "4k" => IMAGE_OUTPUT_4K,
        _ => IMAGE_OUTPUT_1K_2K,
    };

    let input = (input_tokens.max(0) as f64 / 1_000_000.0) * IMAGE_INPUT_PER_MILLION;
    let output = (output_tokens.max(0) as f64 / 1_000_000.0) * IMAGE_OUTPUT_PER_MILLION;
    input + output + images_generated.max(0) as f64 * per_image
}

pub fn usd_to_dkk(usd: f64, rate: f64) -> f64 {
    usd * rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_whisper_one_minute() {
        assert!(approx(whisper_cost(60.0), 0.006));
    }

    #[test]
    fn test_whisper_ten_minutes() {
        assert!(approx(whisper_cost(600.0), 0.06));
    }

    #[test]
    fn test_whisper_fractional_and_zero() {
        assert!(approx(whisper_cost(30.0), 0.003));
        assert!(approx(whisper_cost(0.0), 0.0));
        assert!(approx(whisper_cost(-5.0), 0.0));
    }

    #[test]
    fn test_text_one_million_each() {
        assert!(approx(text_generation_cost(1_000_000, 1_000_000), 1.50));
    }

    #[test]
    fn test_text_typical_request() {
        let expected = (1000.0 / 1_000_000.0) * 0.50 + (500.0 / 1_000_000.0) * 1.00;
        assert!(approx(text_generation_cost(1000, 500), expected));
    }

    #[test]
    fn test_single_2k_image() {
        assert!(approx(image_generation_cost(0, 0, 1, "2k"), 0.134));
    }

    #[test]
    fn test_single_4k_image() {
        assert!(approx(image_generation_cost(0, 0, 1, "4k"), 0.24));
    }

    #[test]
    fn test_1k_priced_as_2k() {
        assert!(approx(
            image_generation_cost(0, 0, 1, "1k"),
            image_generation_cost(0, 0, 1, "2k")
        ));
    }

    #[test]
    fn test_image_with_tokens() {
        let token_cost = (1000.0 / 1_000_000.0) * 2.00 + (500.0 / 1_000_000.0) * 12.00;
        assert!(approx(
            image_generation_cost(1000, 500, 1, "2k"),
            token_cost + 0.134
        ));
    }

    #[test]
    fn test_multiple_images() {
        assert!(approx(image_generation_cost(0, 0, 3, "2k"), 0.134 * 3.0));
    }

    #[test]
    fn test_usd_to_dkk() {
        assert!(approx(usd_to_dkk(1.0, 7.0), 7.0));
    }
}
