// SPDX-License-Identifier: GPL-3.0-only

//! Decode engine
//!
//! Each raster frame goes through at most two tiers:
//!
//! 1. the platform's native detector, when it supports the target symbology
//! 2. the software decoder, once per tuning profile, until one finds a symbol
//!
//! Decoder errors are indistinguishable from "nothing found" to the caller.

pub mod native;
pub mod profiles;
pub mod software;

pub use native::{NativeDetector, QrFastPath};
pub use profiles::{Binarizer, TuningProfile, default_profiles, profile_chain};
pub use software::RxingDecoder;

use crate::errors::DecodeError;
use crate::scanner::sampler::RasterFrame;
use rxing::BarcodeFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

/// Barcode encoding the scanner is deployed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Symbology {
    #[default]
    #[serde(rename = "code-128")]
    Code128,
    #[serde(rename = "code-39")]
    Code39,
    #[serde(rename = "code-93")]
    Code93,
    #[serde(rename = "codabar")]
    Codabar,
    #[serde(rename = "ean-8")]
    Ean8,
    #[serde(rename = "ean-13")]
    Ean13,
    #[serde(rename = "upc-a")]
    UpcA,
    #[serde(rename = "upc-e")]
    UpcE,
    #[serde(rename = "itf")]
    Itf,
    #[serde(rename = "qr-code")]
    QrCode,
}

impl Symbology {
    pub const ALL: [Symbology; 10] = [
        Symbology::Code128,
        Symbology::Code39,
        Symbology::Code93,
        Symbology::Codabar,
        Symbology::Ean8,
        Symbology::Ean13,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Itf,
        Symbology::QrCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Code128 => "code-128",
            Symbology::Code39 => "code-39",
            Symbology::Code93 => "code-93",
            Symbology::Codabar => "codabar",
            Symbology::Ean8 => "ean-8",
            Symbology::Ean13 => "ean-13",
            Symbology::UpcA => "upc-a",
            Symbology::UpcE => "upc-e",
            Symbology::Itf => "itf",
            Symbology::QrCode => "qr-code",
        }
    }

    /// rxing format for this symbology
    pub fn barcode_format(&self) -> BarcodeFormat {
        match self {
            Symbology::Code128 => BarcodeFormat::CODE_128,
            Symbology::Code39 => BarcodeFormat::CODE_39,
            Symbology::Code93 => BarcodeFormat::CODE_93,
            Symbology::Codabar => BarcodeFormat::CODABAR,
            Symbology::Ean8 => BarcodeFormat::EAN_8,
            Symbology::Ean13 => BarcodeFormat::EAN_13,
            Symbology::UpcA => BarcodeFormat::UPC_A,
            Symbology::UpcE => BarcodeFormat::UPC_E,
            Symbology::Itf => BarcodeFormat::ITF,
            Symbology::QrCode => BarcodeFormat::QR_CODE,
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        if normalized == "qr" {
            return Ok(Symbology::QrCode);
        }
        Symbology::ALL
            .into_iter()
            .find(|sym| sym.as_str().replace('-', "") == normalized)
            .ok_or_else(|| format!("unknown symbology '{}'", s))
    }
}

/// Which tier produced a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderPath {
    Native,
    Software { profile: String },
}

impl fmt::Display for DecoderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderPath::Native => f.write_str("native"),
            DecoderPath::Software { profile } => write!(f, "software/{}", profile),
        }
    }
}

/// A symbol found in one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    /// Trimmed, non-empty text
    pub text: String,
    pub symbology: Symbology,
    pub path: DecoderPath,
}

/// Outcome of decoding one raster frame
pub type DecodeAttempt = Option<DecodedSymbol>;

/// One software decode pass with a given profile
pub trait ProfileDecoder: Send + Sync {
    fn decode_profile(
        &self,
        raster: &RasterFrame,
        symbology: Symbology,
        profile: &TuningProfile,
    ) -> Result<Option<String>, DecodeError>;
}

/// Decoder tier selection, resolved once per scanning run
#[derive(Clone)]
pub enum DecoderStrategy {
    /// Native detector first, software decoder as fallback
    NativeDetector(Arc<dyn NativeDetector>),
    /// Software decoder only
    SoftwareDecoder,
}

impl DecoderStrategy {
    /// Pick the strategy for a platform detector and target symbology
    pub fn resolve(
        detector: Option<Arc<dyn NativeDetector>>,
        symbology: Symbology,
        allow_native: bool,
    ) -> Self {
        match detector {
            Some(detector) if allow_native && detector.supports(symbology) => {
                debug!(detector = detector.name(), %symbology, "Using native fast path");
                DecoderStrategy::NativeDetector(detector)
            }
            _ => {
                debug!(%symbology, "Using software decoder only");
                DecoderStrategy::SoftwareDecoder
            }
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, DecoderStrategy::NativeDetector(_))
    }
}

impl fmt::Debug for DecoderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderStrategy::NativeDetector(d) => write!(f, "NativeDetector({})", d.name()),
            DecoderStrategy::SoftwareDecoder => f.write_str("SoftwareDecoder"),
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Runs the tiers against raster frames
#[derive(Clone)]
pub struct DecodeEngine {
    symbology: Symbology,
    strategy: DecoderStrategy,
    profiles: Vec<TuningProfile>,
    software: Arc<dyn ProfileDecoder>,
}

impl DecodeEngine {
    pub fn new(symbology: Symbology, strategy: DecoderStrategy, profiles: Vec<TuningProfile>) -> Self {
        Self::with_software_decoder(symbology, strategy, profiles, Arc::new(RxingDecoder::new()))
    }

    /// Build an engine around a specific software decoder
    pub fn with_software_decoder(
        symbology: Symbology,
        strategy: DecoderStrategy,
        profiles: Vec<TuningProfile>,
        software: Arc<dyn ProfileDecoder>,
    ) -> Self {
        Self {
            symbology,
            strategy,
            profiles,
            software,
        }
    }

    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    pub fn strategy(&self) -> &DecoderStrategy {
        &self.strategy
    }

    /// Look for one symbol in the raster
    pub fn decode(&self, raster: &RasterFrame) -> DecodeAttempt {
        if !raster.is_valid() {
            debug!(
                error = %DecodeError::InvalidFrame(format!("{}x{}", raster.width, raster.height)),
                "Skipping unusable raster"
            );
            return None;
        }

        if let DecoderStrategy::NativeDetector(detector) = &self.strategy {
            match detector.detect(raster, self.symbology) {
                Ok(Some(text)) => {
                    if let Some(text) = non_empty(text) {
                        return Some(DecodedSymbol {
                            text,
                            symbology: self.symbology,
                            path: DecoderPath::Native,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(detector = detector.name(), error = %e, "Native detector failed"),
            }
        }

        for profile in &self.profiles {
            match self.software.decode_profile(raster, self.symbology, profile) {
                Ok(Some(text)) => {
                    if let Some(text) = non_empty(text) {
                        trace!(profile = profile.name, "Software decoder hit");
                        return Some(DecodedSymbol {
                            text,
                            symbology: self.symbology,
                            path: DecoderPath::Software {
                                profile: profile.name.to_string(),
                            },
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(profile = profile.name, error = %e, "Software decoder failed"),
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns a scripted answer per profile name and records the call order
    struct ScriptedDecoder {
        answers: Vec<(&'static str, Result<Option<String>, DecodeError>)>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedDecoder {
        fn new(answers: Vec<(&'static str, Result<Option<String>, DecodeError>)>) -> Arc<Self> {
            Arc::new(Self {
                answers,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProfileDecoder for ScriptedDecoder {
        fn decode_profile(
            &self,
            _raster: &RasterFrame,
            _symbology: Symbology,
            profile: &TuningProfile,
        ) -> Result<Option<String>, DecodeError> {
            self.calls.lock().unwrap().push(profile.name);
            self.answers
                .iter()
                .find(|(name, _)| *name == profile.name)
                .map(|(_, answer)| answer.clone())
                .unwrap_or(Ok(None))
        }
    }

    struct FixedDetector(Result<Option<String>, DecodeError>);

    impl NativeDetector for FixedDetector {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn supports(&self, symbology: Symbology) -> bool {
            symbology == Symbology::Code128
        }
        fn detect(&self, _: &RasterFrame, _: Symbology) -> Result<Option<String>, DecodeError> {
            self.0.clone()
        }
    }

    fn raster() -> RasterFrame {
        RasterFrame::new(4, 4, vec![128; 16])
    }

    fn engine(strategy: DecoderStrategy, software: Arc<ScriptedDecoder>) -> DecodeEngine {
        DecodeEngine::with_software_decoder(Symbology::Code128, strategy, default_profiles(), software)
    }

    #[test]
    fn test_fallback_result_wins_over_earlier_misses() {
        let software = ScriptedDecoder::new(vec![("global-histogram", Ok(Some("FALLBACK".into())))]);
        let engine = engine(DecoderStrategy::SoftwareDecoder, Arc::clone(&software));

        let symbol = engine.decode(&raster()).expect("symbol");
        assert_eq!(symbol.text, "FALLBACK");
        assert_eq!(
            symbol.path,
            DecoderPath::Software {
                profile: "global-histogram".into()
            }
        );
        assert_eq!(software.calls(), vec!["primary", "downscaled", "global-histogram"]);
    }

    #[test]
    fn test_decoder_errors_count_as_misses() {
        let software = ScriptedDecoder::new(vec![
            ("primary", Err(DecodeError::Decoder("checksum".into()))),
            ("downscaled", Ok(Some("  ".into()))),
            ("fixed-threshold", Ok(Some(" A1B2C3 \n".into()))),
        ]);
        let engine = engine(DecoderStrategy::SoftwareDecoder, software);

        let symbol = engine.decode(&raster()).expect("symbol");
        assert_eq!(symbol.text, "A1B2C3");
    }

    #[test]
    fn test_all_profiles_exhausted() {
        let software = ScriptedDecoder::new(Vec::new());
        let engine = engine(DecoderStrategy::SoftwareDecoder, Arc::clone(&software));
        assert!(engine.decode(&raster()).is_none());
        assert_eq!(software.calls().len(), 4);
    }

    #[test]
    fn test_native_hit_skips_software() {
        let software = ScriptedDecoder::new(vec![("primary", Ok(Some("SOFT".into())))]);
        let strategy = DecoderStrategy::NativeDetector(Arc::new(FixedDetector(Ok(Some("NATIVE".into())))));
        let engine = engine(strategy, Arc::clone(&software));

        let symbol = engine.decode(&raster()).expect("symbol");
        assert_eq!(symbol.text, "NATIVE");
        assert_eq!(symbol.path, DecoderPath::Native);
        assert!(software.calls().is_empty());
    }

    #[test]
    fn test_native_failure_falls_back_to_software() {
        let software = ScriptedDecoder::new(vec![("primary", Ok(Some("SOFT".into())))]);
        let strategy = DecoderStrategy::NativeDetector(Arc::new(FixedDetector(Err(
            DecodeError::Decoder("boom".into()),
        ))));
        let engine = engine(strategy, software);

        assert_eq!(engine.decode(&raster()).expect("symbol").text, "SOFT");
    }

    #[test]
    fn test_strategy_resolution() {
        let detector: Arc<dyn NativeDetector> = Arc::new(FixedDetector(Ok(None)));
        assert!(DecoderStrategy::resolve(Some(Arc::clone(&detector)), Symbology::Code128, true).is_native());
        assert!(!DecoderStrategy::resolve(Some(Arc::clone(&detector)), Symbology::Ean13, true).is_native());
        assert!(!DecoderStrategy::resolve(Some(detector), Symbology::Code128, false).is_native());
        assert!(!DecoderStrategy::resolve(None, Symbology::Code128, true).is_native());
    }

    #[test]
    fn test_invalid_raster_is_no_result() {
        let software = ScriptedDecoder::new(vec![("primary", Ok(Some("X".into())))]);
        let engine = engine(DecoderStrategy::SoftwareDecoder, Arc::clone(&software));
        assert!(engine.decode(&RasterFrame::new(4, 4, vec![0; 3])).is_none());
        assert!(software.calls().is_empty());
    }

    #[test]
    fn test_symbology_parse() {
        assert_eq!("code128".parse::<Symbology>(), Ok(Symbology::Code128));
        assert_eq!("CODE_128".parse::<Symbology>(), Ok(Symbology::Code128));
        assert_eq!("ean-13".parse::<Symbology>(), Ok(Symbology::Ean13));
        assert_eq!("qr".parse::<Symbology>(), Ok(Symbology::QrCode));
        assert!("pdf417".parse::<Symbology>().is_err());
    }
}
