use std::{env, path::PathBuf};

use anyhow::{Context, bail};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub max_body_bytes: usize,
    pub commission_percent: i64,
    pub storage: StorageConfig,
    pub smtp: Option<SmtpConfig>,
    pub payos: Option<PayosConfig>,
    pub watermark: WatermarkConfig,
    pub exhibitions: Option<ExhibitionSourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local { root: PathBuf },
    S3 { bucket: String, prefix: Option<String> },
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct PayosConfig {
    pub client_id: String,
    pub api_key: String,
    pub checksum_key: String,
    pub base_url: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    pub text: String,
    pub font_path: Option<PathBuf>,
    /// Overlay opacity in `0.0..=1.0`.
    pub opacity: f32,
}

/// Where exhibitions are crawled from and how listing items are picked out.
#[derive(Debug, Clone)]
pub struct ExhibitionSourceConfig {
    pub url: String,
    pub item_selector: String,
    pub title_selector: String,
    pub venue_selector: Option<String>,
    pub schedule_selector: Option<String>,
    pub link_selector: String,
    pub image_selector: Option<String>,
}

const DEFAULT_PAYOS_BASE_URL: &str = "https://api-merchant.payos.vn";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = get("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = get("APP_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let max_body_bytes = get("MAX_BODY_BYTES")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10 * 1024 * 1024);
        let commission_percent = get("COMMISSION_PERCENT")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(10);
        if !(0..=100).contains(&commission_percent) {
            bail!("COMMISSION_PERCENT must be between 0 and 100");
        }

        let storage = match get("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "local" => StorageConfig::Local {
                root: PathBuf::from(
                    get("LOCAL_STORAGE_DIR").unwrap_or_else(|| "storage".to_string()),
                ),
            },
            "s3" => StorageConfig::S3 {
                bucket: get("S3_BUCKET").context("S3_BUCKET is required for the s3 backend")?,
                prefix: get("S3_PREFIX"),
            },
            other => bail!("unknown STORAGE_BACKEND {other}"),
        };

        let smtp = match (get("SMTP_HOST"), get("MAIL_FROM")) {
            (Some(host), Some(from_address)) => Some(SmtpConfig {
                host,
                port: get("SMTP_PORT")
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(587),
                username: get("SMTP_USERNAME").unwrap_or_default(),
                password: get("SMTP_PASSWORD").unwrap_or_default(),
                from_address,
            }),
            _ => None,
        };

        let payos = match (
            get("PAYOS_CLIENT_ID"),
            get("PAYOS_API_KEY"),
            get("PAYOS_CHECKSUM_KEY"),
        ) {
            (Some(client_id), Some(api_key), Some(checksum_key)) => Some(PayosConfig {
                client_id,
                api_key,
                checksum_key,
                base_url: get("PAYOS_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_PAYOS_BASE_URL.to_string()),
                return_url: get("PAYMENT_RETURN_URL")
                    .unwrap_or_else(|| "http://localhost:5173/payment/success".to_string()),
                cancel_url: get("PAYMENT_CANCEL_URL")
                    .unwrap_or_else(|| "http://localhost:5173/payment/cancel".to_string()),
            }),
            _ => None,
        };

        let opacity = get("WATERMARK_OPACITY")
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(0.35)
            .clamp(0.0, 1.0);
        let watermark = WatermarkConfig {
            text: get("WATERMARK_TEXT").unwrap_or_else(|| "ArtMarket".to_string()),
            font_path: get("WATERMARK_FONT_PATH").map(PathBuf::from),
            opacity,
        };

        let exhibitions = get("EXHIBITION_SOURCE_URL").map(|url| ExhibitionSourceConfig {
            url,
            item_selector: get("EXHIBITION_ITEM_SELECTOR")
                .unwrap_or_else(|| "article.exhibition".to_string()),
            title_selector: get("EXHIBITION_TITLE_SELECTOR").unwrap_or_else(|| "h2".to_string()),
            venue_selector: get("EXHIBITION_VENUE_SELECTOR"),
            schedule_selector: get("EXHIBITION_SCHEDULE_SELECTOR"),
            link_selector: get("EXHIBITION_LINK_SELECTOR").unwrap_or_else(|| "a".to_string()),
            image_selector: get("EXHIBITION_IMAGE_SELECTOR"),
        });

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            max_body_bytes,
            commission_percent,
            storage,
            smtp,
            payos,
            watermark,
            exhibitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/art"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.commission_percent, 10);
        assert_eq!(
            config.storage,
            StorageConfig::Local {
                root: PathBuf::from("storage")
            }
        );
        assert!(config.smtp.is_none());
        assert!(config.payos.is_none());
        assert!(config.exhibitions.is_none());
        assert_eq!(config.watermark.text, "ArtMarket");
    }

    #[test]
    fn missing_jwt_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("STORAGE_BACKEND", "s3"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    fn payos_is_enabled_only_with_all_credentials() {
        let partial = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("PAYOS_CLIENT_ID", "id"),
        ]))
        .unwrap();
        assert!(partial.payos.is_none());

        let full = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("PAYOS_CLIENT_ID", "id"),
            ("PAYOS_API_KEY", "key"),
            ("PAYOS_CHECKSUM_KEY", "checksum"),
        ]))
        .unwrap();
        let payos = full.payos.unwrap();
        assert_eq!(payos.base_url, DEFAULT_PAYOS_BASE_URL);
    }

    #[test]
    fn opacity_is_clamped_and_commission_is_bounded() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("WATERMARK_OPACITY", "4.2"),
        ]))
        .unwrap();
        assert_eq!(config.watermark.opacity, 1.0);

        assert!(
            AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://x"),
                ("JWT_SECRET", "s"),
                ("COMMISSION_PERCENT", "150"),
            ]))
            .is_err()
        );
    }
}
