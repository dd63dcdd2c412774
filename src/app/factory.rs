use crate::{
    config::Config,
    loader::Loader,
    semantic::{CitySearch, Embedder, EmbeddingModel, ResolverOptions},
    store::{
        schema::{ADMIN_LABEL_SCHEMA, ALTERNATE_NAMES_TABLE, ALTERNATE_NAME_SCHEMA, PLACE_SCHEMA},
        ReferenceStore, SqlStore,
    },
};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Process-wide resources: the configuration and one store connection,
/// acquired at startup and released when the factory is dropped.
pub struct AppFactory {
    config: Config,
    store: Arc<SqlStore>,
}

impl AppFactory {
    /// Connect to the reference store described by `config`.
    pub fn connect(config: Config) -> Result<Self> {
        let store = SqlStore::connect(&config.database, config.cities.clone())
            .context("Failed to connect to the reference store")?;

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn store(&self) -> Arc<dyn ReferenceStore> {
        self.store.clone()
    }

    /// Create every table the loaders and the city view use.
    pub fn init_schema(&self) -> Result<Vec<String>> {
        let place_table = &self.config.cities.place_table;
        let tables = [
            (&PLACE_SCHEMA, place_table.as_str()),
            (&ADMIN_LABEL_SCHEMA, self.config.cities.admin_table.as_str()),
            (&ALTERNATE_NAME_SCHEMA, ALTERNATE_NAMES_TABLE),
        ];

        let mut created = Vec::new();
        for (schema, table) in tables {
            if created.iter().any(|t| t == table) {
                continue;
            }
            self.store
                .ensure_table(schema, table)
                .with_context(|| format!("Failed to create table {table}"))?;
            created.push(table.to_string());
        }

        Ok(created)
    }

    /// Loader writing admin labels to the table the city view joins against.
    pub fn loader(&self) -> Loader<'_> {
        Loader::new(self.store.as_ref(), self.config.loader.batch_size)
            .with_admin_table(&self.config.cities.admin_table)
    }

    /// Table the city view reads places from.
    pub fn place_table(&self) -> &str {
        &self.config.cities.place_table
    }

    /// Load the configured embedding model.
    pub fn create_embedder(&self) -> Result<Arc<dyn Embedder>> {
        let search = &self.config.search;
        let model = EmbeddingModel::new(
            &search.model,
            self.config.cache_dir(),
            search.batch_size,
            search.show_progress,
        )
        .with_context(|| format!("Failed to load embedding model '{}'", search.model))?;

        Ok(Arc::new(model))
    }

    /// Load the model and build the city index.
    pub fn create_city_search(&self) -> Result<CitySearch> {
        let embedder = self.create_embedder()?;
        let options = ResolverOptions::from(&self.config.search);

        CitySearch::open(self.store(), embedder, options).context("Failed to build the city index")
    }
}
