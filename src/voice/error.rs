use serde::Serialize;

/// Everything that can go wrong with voice capture. Platform error codes are
/// folded into this closed set by [`VoiceError::from_code`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("Speech recognition is not supported on this platform. You can type your message instead.")]
    UnsupportedCapability,
    #[error("Microphone access denied. Please allow microphone permissions in your settings.")]
    PermissionDenied,
    #[error("No speech detected. Please try again.")]
    NoSpeechDetected,
    #[error("Microphone not found. Please check your device.")]
    AudioCaptureUnavailable,
    #[error("Speech service unavailable. This feature requires an internet connection. You can still type your message below.")]
    NetworkUnavailable,
    #[error("Speech service is blocked. Please check your settings or firewall.")]
    ServiceBlocked,
    #[error("Recording was stopped.")]
    Aborted,
    #[error("Language not supported.")]
    LanguageUnsupported,
    #[error("Voice input error: {0}. You can type your message instead.")]
    Unknown(String),
}

impl VoiceError {
    /// Map a speech engine error code (`no-speech`, `not-allowed`, ...).
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => VoiceError::NoSpeechDetected,
            "audio-capture" => VoiceError::AudioCaptureUnavailable,
            "not-allowed" => VoiceError::PermissionDenied,
            "network" => VoiceError::NetworkUnavailable,
            "service-not-allowed" => VoiceError::ServiceBlocked,
            "aborted" => VoiceError::Aborted,
            "language-not-supported" => VoiceError::LanguageUnsupported,
            "not-supported" => VoiceError::UnsupportedCapability,
            other => VoiceError::Unknown(other.to_string()),
        }
    }
}

impl Serialize for VoiceError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
