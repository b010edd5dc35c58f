use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::core::cases::{CaseService, FileStore};
use crate::core::chat_stream::{ModelClient, OpenAiClient};
use crate::core::config::{Config, Credentials};
use crate::core::constants::SYSTEM_INSTRUCTION;
use crate::core::geolocation::{LocationProvider, DEFAULT_LOOKUP_TIMEOUT};
use crate::utils::logging::TranscriptLog;

/// Everything a conversation needs from the outside world.
pub struct SessionContext {
    pub client: Arc<dyn ModelClient>,
    pub system_instruction: String,
    pub cases: Option<CaseService>,
    pub location: Option<Arc<dyn LocationProvider>>,
    pub location_timeout: Duration,
    pub logging: TranscriptLog,
}

impl SessionContext {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            cases: None,
            location: None,
            location_timeout: DEFAULT_LOOKUP_TIMEOUT,
            logging: TranscriptLog::disabled(),
        }
    }

    pub fn with_cases(mut self, cases: CaseService) -> Self {
        self.cases = Some(cases);
        self
    }

    pub fn with_location(mut self, provider: Arc<dyn LocationProvider>, timeout: Duration) -> Self {
        self.location = Some(provider);
        self.location_timeout = timeout;
        self
    }

    pub fn with_logging(mut self, logging: TranscriptLog) -> Self {
        self.logging = logging;
        self
    }

    /// Wire up the HTTP client, case store and location source from config.
    pub fn bootstrap(
        config: &Config,
        credentials: Credentials,
        log_file: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let client = OpenAiClient::new(
            Client::new(),
            credentials.base_url,
            credentials.api_key,
            config.model.clone(),
        )
        .with_sampling(config.temperature, config.max_tokens);

        let data_dir = config.resolve_data_dir()?;
        let mut session = Self::new(Arc::new(client))
            .with_cases(CaseService::new(Arc::new(FileStore::new(data_dir))));

        if let Some(provider) = config.location_provider() {
            session = session.with_location(Arc::new(provider), config.geolocation_timeout());
        }
        if let Some(path) = log_file {
            session = session.with_logging(TranscriptLog::open(path)?);
        }
        Ok(session)
    }
}
