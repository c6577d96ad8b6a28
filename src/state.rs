use crate::config::AppConfig;
use crate::services::conversation::TurnSettings;
use crate::services::library::ScheduleLibrary;
use crate::services::llm_provider::ChatService;
use crate::services::pdf::PageExtractor;
use crate::services::session::SessionStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub library: ScheduleLibrary,
    pub chat: Arc<dyn ChatService>,
    pub turn_settings: Arc<TurnSettings>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        chat: Arc<dyn ChatService>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        let library = ScheduleLibrary::new(&config.documents, extractor);
        let turn_settings = TurnSettings::from_config(&config.llm);

        Self {
            config: Arc::new(config),
            sessions: SessionStore::new(),
            library,
            chat,
            turn_settings: Arc::new(turn_settings),
        }
    }
}
