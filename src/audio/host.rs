use crate::error::AudioError;
use crate::session::{AudioSession, MicrophoneAccess, RecordPermission, SessionCategory};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};

/// Checks the default cpal host has the devices a session category needs
pub struct HostAudioSession {
    host: cpal::Host,
}

impl HostAudioSession {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for HostAudioSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSession for HostAudioSession {
    fn configure(&mut self, category: SessionCategory) -> Result<(), AudioError> {
        if category == SessionCategory::PlayAndRecord && self.host.default_input_device().is_none()
        {
            return Err(AudioError::SessionConfiguration(
                "no input audio device available".to_string(),
            ));
        }

        if self.host.default_output_device().is_none() {
            return Err(AudioError::SessionConfiguration(
                "no output audio device available".to_string(),
            ));
        }

        tracing::debug!("Audio session configured for {:?} on {:?}", category, self.host.id());
        Ok(())
    }
}

/// Desktop stand-in for the microphone permission prompt: access counts as
/// granted when the default input device reports a usable configuration.
pub struct CpalMicrophone;

#[async_trait(?Send)]
impl MicrophoneAccess for CpalMicrophone {
    async fn request_record_permission(&self) -> RecordPermission {
        let input_check = tokio::task::spawn_blocking(|| {
            let device = cpal::default_host().default_input_device()?;
            match device.default_input_config() {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Default input device is not usable: {}", e);
                    None
                }
            }
        })
        .await;

        match input_check {
            Ok(Some(config)) => {
                tracing::info!(
                    "Microphone available ({} Hz, {} channel(s) native)",
                    config.sample_rate().0,
                    config.channels()
                );
                RecordPermission::Granted
            }
            Ok(None) => RecordPermission::Denied,
            Err(e) => {
                tracing::error!("Microphone check panicked: {}", e);
                RecordPermission::Denied
            }
        }
    }
}
