use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::providers::{ImageClient, SpeechClient, TextClient};

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub speech: Arc<SpeechClient>,
    pub text: Arc<TextClient>,
    pub image: Arc<ImageClient>,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Config) -> Self {
        let speech = Arc::new(SpeechClient::new(&config));
        let text = Arc::new(TextClient::new(&config));
        let image = Arc::new(ImageClient::new(&config));

        AppState {
            db,
            config: Arc::new(config),
            speech,
            text,
            image,
        }
    }
}
