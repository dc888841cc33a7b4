//! Style template storage and the cached catalog.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use styleswap_core::{StyleId, StyleTemplate};

use super::RepositoryError;

/// Styles written on first start when the catalog is empty.
#[must_use]
pub fn default_styles() -> Vec<StyleTemplate> {
    let style = |id: &str, name: &str, image: &str, prompt: &str, description: &str, order: i32| {
        StyleTemplate {
            id: StyleId::new(id),
            name: name.to_string(),
            image_url: format!("https://images.unsplash.com/{image}?w=800&q=80"),
            prompt: prompt.to_string(),
            description: description.to_string(),
            display_order: order,
            auto_generate: false,
        }
    };

    vec![
        style(
            "valentine-love",
            "Eternal Romance",
            "photo-1518199266791-5375a83190b7",
            "A romantic fine art photo with a soft dreamy glow, surrounded by floating red and pink rose petals, elegant lighting, warm color palette, professional photography, ethereal atmosphere. Preserve facial identity perfectly.",
            "Perfect for Valentine gifts.",
            1,
        ),
        style(
            "viking-sikh",
            "Sikh Warrior Viking",
            "photo-1519074063912-ad2dbf50b16d",
            "A majestic Sikh warrior in Viking chieftain attire, wearing a traditional turban with ceremonial accents, thick beard, heavy fur cloak with silver brooches, leather armor, standing in a snowy misty forest, hyper-realistic, historical epic cinematic style.",
            "Norse-Sikh fusion warrior.",
            2,
        ),
        style(
            "1",
            "Royal Indian Wedding",
            "photo-1583939003579-730e3918a45a",
            "A magnificent Indian wedding photo. Traditional royal attire with intricate gold embroidery, heavy jewelry, and a palace background. Warm cinematic lighting.",
            "Traditional elegance.",
            3,
        ),
        style(
            "2",
            "Cyberpunk Neon",
            "photo-1550684848-fac1c5b4e853",
            "Cyberpunk 2077 style. Neon glowing accents, futuristic techwear, rainy night city background with teal and pink lighting. High-tech aesthetic.",
            "Futuristic sci-fi.",
            4,
        ),
        style(
            "3",
            "Pixar Animation",
            "photo-1534447677768-be436bb09401",
            "3D Disney Pixar animation style. Big expressive eyes, smooth skin textures, stylized features, vibrant and soft cinematic lighting.",
            "3D Animated character.",
            5,
        ),
        style(
            "4",
            "Greek Marble Statue",
            "photo-1549887534-1541e9326642",
            "Classic white marble Greek sculpture. Intricate carved details, smooth stone texture, museum gallery lighting, timeless museum aesthetic.",
            "Ancient masterpiece.",
            6,
        ),
        style(
            "10",
            "Studio Ghibli Anime",
            "photo-1528360983277-13d401cdc186",
            "Hand-painted Studio Ghibli anime style. Soft watercolor textures, whimsical atmosphere, lush green background, gentle lighting.",
            "Japanese animation.",
            7,
        ),
    ]
}

/// Parse an exported catalog. Anything other than a JSON array is rejected.
///
/// # Errors
///
/// Returns the deserialization error.
pub fn parse_import(json: &str) -> Result<Vec<StyleTemplate>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Style template persistence.
#[async_trait]
pub trait StyleRepository: Send + Sync {
    /// All styles, ordered by `display_order` then creation time.
    async fn list(&self) -> Result<Vec<StyleTemplate>, RepositoryError>;

    /// Insert or replace a style by ID.
    async fn upsert(&self, style: &StyleTemplate) -> Result<(), RepositoryError>;

    /// Delete a style. Returns `RepositoryError::NotFound` if it did not exist.
    async fn delete(&self, id: &StyleId) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed style repository.
pub struct PgStyleRepository {
    pool: PgPool,
}

impl PgStyleRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StyleRow {
    id: String,
    name: String,
    image_url: String,
    prompt: String,
    description: String,
    display_order: i32,
    auto_generate: bool,
}

impl From<StyleRow> for StyleTemplate {
    fn from(row: StyleRow) -> Self {
        Self {
            id: StyleId::new(row.id),
            name: row.name,
            image_url: row.image_url,
            prompt: row.prompt,
            description: row.description,
            display_order: row.display_order,
            auto_generate: row.auto_generate,
        }
    }
}

#[async_trait]
impl StyleRepository for PgStyleRepository {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<StyleTemplate>, RepositoryError> {
        let rows: Vec<StyleRow> = sqlx::query_as(
            r"
            SELECT id, name, image_url, prompt, description, display_order, auto_generate
            FROM styles
            ORDER BY display_order ASC, created_at ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StyleTemplate::from).collect())
    }

    #[instrument(skip(self, style), fields(style_id = %style.id))]
    async fn upsert(&self, style: &StyleTemplate) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO styles (id, name, image_url, prompt, description, display_order, auto_generate)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                image_url = EXCLUDED.image_url,
                prompt = EXCLUDED.prompt,
                description = EXCLUDED.description,
                display_order = EXCLUDED.display_order,
                auto_generate = EXCLUDED.auto_generate,
                updated_at = NOW()
            ",
        )
        .bind(&style.id)
        .bind(&style.name)
        .bind(&style.image_url)
        .bind(&style.prompt)
        .bind(&style.description)
        .bind(style.display_order)
        .bind(style.auto_generate)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &StyleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM styles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// In-memory style repository. Insertion order breaks `display_order` ties.
#[derive(Default)]
pub struct MemoryStyleRepository {
    styles: RwLock<BTreeMap<StyleId, (u64, StyleTemplate)>>,
    next_seq: AtomicU64,
}

impl MemoryStyleRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StyleRepository for MemoryStyleRepository {
    async fn list(&self) -> Result<Vec<StyleTemplate>, RepositoryError> {
        let styles = self.styles.read().await;
        let mut entries: Vec<_> = styles.values().cloned().collect();
        entries.sort_by_key(|(seq, style)| (style.display_order, *seq));
        Ok(entries.into_iter().map(|(_, style)| style).collect())
    }

    async fn upsert(&self, style: &StyleTemplate) -> Result<(), RepositoryError> {
        let mut styles = self.styles.write().await;
        let seq = styles
            .get(&style.id)
            .map_or_else(|| self.next_seq.fetch_add(1, Ordering::Relaxed), |(seq, _)| *seq);
        styles.insert(style.id.clone(), (seq, style.clone()));
        Ok(())
    }

    async fn delete(&self, id: &StyleId) -> Result<(), RepositoryError> {
        self.styles
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

/// Cached, ordered view of the style catalog.
///
/// The full list is cached for 5 minutes and invalidated on every write. The
/// first read that finds the catalog empty seeds [`default_styles`]; later
/// empty reads in the same process do not reseed, so an admin can clear the
/// catalog.
#[derive(Clone)]
pub struct StyleCatalog {
    inner: Arc<StyleCatalogInner>,
}

struct StyleCatalogInner {
    repository: Arc<dyn StyleRepository>,
    cache: Cache<(), Arc<Vec<StyleTemplate>>>,
    seed_checked: AtomicBool,
}

impl StyleCatalog {
    #[must_use]
    pub fn new(repository: Arc<dyn StyleRepository>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(StyleCatalogInner {
                repository,
                cache,
                seed_checked: AtomicBool::new(false),
            }),
        }
    }

    /// Ordered style list.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub async fn list(&self) -> Result<Arc<Vec<StyleTemplate>>, RepositoryError> {
        if let Some(styles) = self.inner.cache.get(&()).await {
            debug!("Cache hit for styles");
            return Ok(styles);
        }

        let mut styles = self.inner.repository.list().await?;
        if styles.is_empty() && !self.inner.seed_checked.swap(true, Ordering::SeqCst) {
            tracing::info!("Style catalog empty, seeding defaults");
            self.seed_defaults().await?;
            styles = self.inner.repository.list().await?;
        }
        self.inner.seed_checked.store(true, Ordering::SeqCst);

        let styles = Arc::new(styles);
        self.inner.cache.insert((), Arc::clone(&styles)).await;
        Ok(styles)
    }

    /// Look up one style.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no style has this ID.
    pub async fn get(&self, id: &StyleId) -> Result<StyleTemplate, RepositoryError> {
        self.list()
            .await?
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    /// Insert or replace a style.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn save(&self, style: &StyleTemplate) -> Result<(), RepositoryError> {
        self.inner.repository.upsert(style).await?;
        self.invalidate().await;
        Ok(())
    }

    /// Delete a style.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no style has this ID.
    pub async fn delete(&self, id: &StyleId) -> Result<(), RepositoryError> {
        self.inner.repository.delete(id).await?;
        self.invalidate().await;
        Ok(())
    }

    /// Upsert every style in an imported catalog. Returns the number written.
    ///
    /// # Errors
    ///
    /// Stops at the first failed write.
    pub async fn import(&self, styles: &[StyleTemplate]) -> Result<usize, RepositoryError> {
        for style in styles {
            self.inner.repository.upsert(style).await?;
        }
        self.invalidate().await;
        Ok(styles.len())
    }

    /// Pretty-printed JSON of the current catalog, suitable for [`parse_import`].
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub async fn export(&self) -> Result<String, RepositoryError> {
        self.invalidate().await;
        let styles = self.list().await?;
        Ok(serde_json::to_string_pretty(styles.as_ref())?)
    }

    /// Write the default styles. Returns the number written.
    ///
    /// # Errors
    ///
    /// Stops at the first failed write.
    pub async fn seed_defaults(&self) -> Result<usize, RepositoryError> {
        let defaults = default_styles();
        for style in &defaults {
            self.inner.repository.upsert(style).await?;
        }
        self.invalidate().await;
        Ok(defaults.len())
    }

    async fn invalidate(&self) {
        self.inner.cache.invalidate(&()).await;
    }
}
