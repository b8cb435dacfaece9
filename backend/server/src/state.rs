use std::sync::Arc;

use reqwest::Client;

use super::{
    config::Config,
    database::{PostgrestStore, Store},
    meta::{AdsPlatform, MetaClient},
    reconcile::Reconciler,
};

pub struct AppState {
    pub config: Config,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, reqwest::Error> {
        let client = Client::builder().timeout(config.upstream_timeout).build()?;

        let store = Arc::new(PostgrestStore::new(
            client.clone(),
            &config.supabase_url,
            &config.supabase_key,
        ));
        let ads = Arc::new(MetaClient::new(
            client,
            &config.meta_graph_url,
            &config.meta_api_version,
            config.meta_access_token.clone(),
        ));

        Ok(Self::with_clients(config, store, ads))
    }

    pub fn with_clients(
        config: Config,
        store: Arc<dyn Store>,
        ads: Arc<dyn AdsPlatform>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            reconciler: Reconciler::new(store, ads),
        })
    }
}
