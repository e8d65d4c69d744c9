pub use crate::utils::database;
use crate::modules::realtime::Hub;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use oauth_fcm::{create_shared_token_manager, TokenManager};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{0} not set")]
    MissingVariable(&'static str),
    #[error("Invalid value for {0}")]
    InvalidVariable(&'static str),
    #[error("Failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to run database migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Invalid FCM credentials: {0}")]
    FcmCredentials(String),
    #[error("Failed to bind listener: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AppEnvironment {
    Production,
    Development,
}

impl AppEnvironment {
    pub fn from(raw_environment: String) -> Self {
        match raw_environment.as_ref() {
            "production" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub host: String,
    pub environment: AppEnvironment,
    pub port: u16,
    pub url: String,
}

#[derive(Clone)]
pub struct AuthContext {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

#[derive(Clone)]
pub struct OrderContext {
    pub verification_code_expiry: Duration,
    pub dispatch_radius_km: f64,
    pub default_delivery_fee: BigDecimal,
    pub utc_offset: FixedOffset,
}

#[derive(Clone)]
pub struct PaymentContext {
    pub api_endpoint: String,
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
}

#[derive(Clone)]
pub struct GoogleContext {
    pub fcm_token_manager: Arc<Mutex<TokenManager>>,
    pub fcm_project_id: String,
}

#[derive(Clone)]
pub struct Context {
    pub app: AppContext,
    pub auth: AuthContext,
    pub order: OrderContext,
    pub db_conn: database::DatabaseConnection,
    pub payment: Option<PaymentContext>,
    pub google: Option<GoogleContext>,
    pub realtime: Arc<Hub>,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub environment: AppEnvironment,
    pub port: u16,
    pub url: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
}

#[derive(Clone)]
pub struct OrderConfig {
    pub verification_code_expiry_minutes: i64,
    pub dispatch_radius_km: f64,
    pub default_delivery_fee: BigDecimal,
    pub utc_offset_minutes: i32,
}

#[derive(Clone)]
pub struct PaymentConfig {
    pub api_endpoint: String,
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
}

#[derive(Clone)]
pub struct GoogleConfig {
    pub fcm_credentials: String,
}

#[derive(Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub app: AppConfig,
    pub auth: AuthConfig,
    pub order: OrderConfig,
    pub payment: Option<PaymentConfig>,
    pub google: Option<GoogleConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct Job(DateTime<Utc>);

impl Job {
    pub fn fired_at(&self) -> DateTime<Utc> {
        self.0
    }
}

impl apalis::prelude::Job for Job {
    const NAME: &'static str = "nightbite::Job";
}

impl From<DateTime<Utc>> for Job {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t)
    }
}

pub type JobFn = Arc<
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), apalis::prelude::Error>> + Send>>
        + Send
        + Sync,
>;

pub struct SchedulableJob {
    pub name: &'static str,
    pub schedule: apalis::cron::Schedule,
    pub job: JobFn,
}

fn required(name: &'static str) -> Result<String, StartupError> {
    env::var(name).map_err(|_| StartupError::MissingVariable(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, StartupError> {
    match optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| StartupError::InvalidVariable(name)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, StartupError> {
        dotenvy::dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let database_max_connections = parsed("DATABASE_MAX_CONNECTIONS", 4u32)?;
        let host = optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let environment = optional("APP_ENV").unwrap_or_else(|| "development".to_string());
        let port = parsed("PORT", 8000u16)?;
        let url = optional("URL").unwrap_or_else(|| format!("http://{}:{}", host, port));

        let payment = match (optional("RAZORPAY_KEY_ID"), optional("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(PaymentConfig {
                api_endpoint: optional("RAZORPAY_API_ENDPOINT")
                    .unwrap_or_else(|| "https://api.razorpay.com/v1".to_string()),
                key_id,
                key_secret,
                currency: optional("PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string()),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(StartupError::MissingVariable("RAZORPAY_KEY_SECRET")),
            (None, Some(_)) => return Err(StartupError::MissingVariable("RAZORPAY_KEY_ID")),
        };

        Ok(Self {
            database: DatabaseConfig {
                url: database_url,
                max_connections: database_max_connections,
            },
            app: AppConfig {
                host,
                environment: AppEnvironment::from(environment),
                port,
                url,
            },
            auth: AuthConfig {
                access_token_ttl_minutes: parsed("ACCESS_TOKEN_TTL_MINUTES", 1440)?,
                refresh_token_ttl_days: parsed("REFRESH_TOKEN_TTL_DAYS", 30)?,
            },
            order: OrderConfig {
                verification_code_expiry_minutes: parsed("VERIFICATION_CODE_EXPIRY_MINUTES", 30)?,
                dispatch_radius_km: parsed("DISPATCH_RADIUS_KM", 10.0)?,
                default_delivery_fee: parsed("DEFAULT_DELIVERY_FEE", BigDecimal::from(30))?,
                utc_offset_minutes: parsed("APP_UTC_OFFSET_MINUTES", 330)?,
            },
            payment,
            google: optional("GOOGLE_FCM_CREDENTIALS")
                .map(|fcm_credentials| GoogleConfig { fcm_credentials }),
        })
    }
}

#[derive(Deserialize)]
struct GoogleProjectCredentials {
    project_id: String,
}

impl GoogleConfig {
    fn into_context(self) -> Result<GoogleContext, StartupError> {
        let decoded = BASE64_STANDARD
            .decode(self.fcm_credentials)
            .map_err(|err| StartupError::FcmCredentials(err.to_string()))?;
        let parsed = serde_json::from_slice::<GoogleProjectCredentials>(&decoded)
            .map_err(|err| StartupError::FcmCredentials(err.to_string()))?;
        let fcm_token_manager = create_shared_token_manager::<&[u8]>(&decoded)
            .map_err(|err| StartupError::FcmCredentials(format!("{:?}", err)))?;

        Ok(GoogleContext {
            fcm_token_manager,
            fcm_project_id: parsed.project_id,
        })
    }
}

impl Context {
    pub fn new(
        config: Config,
        db_conn: database::DatabaseConnection,
        google: Option<GoogleContext>,
    ) -> Result<Self, StartupError> {
        let utc_offset = FixedOffset::east_opt(config.order.utc_offset_minutes * 60)
            .ok_or(StartupError::InvalidVariable("APP_UTC_OFFSET_MINUTES"))?;

        Ok(Context {
            app: AppContext {
                host: config.app.host,
                environment: config.app.environment,
                port: config.app.port,
                url: config.app.url,
            },
            auth: AuthContext {
                access_token_ttl: Duration::minutes(config.auth.access_token_ttl_minutes),
                refresh_token_ttl: Duration::days(config.auth.refresh_token_ttl_days),
            },
            order: OrderContext {
                verification_code_expiry: Duration::minutes(
                    config.order.verification_code_expiry_minutes,
                ),
                dispatch_radius_km: config.order.dispatch_radius_km,
                default_delivery_fee: config.order.default_delivery_fee,
                utc_offset,
            },
            db_conn,
            payment: config.payment.map(|payment| PaymentContext {
                api_endpoint: payment.api_endpoint,
                key_id: payment.key_id,
                key_secret: payment.key_secret,
                currency: payment.currency,
            }),
            google,
            realtime: Arc::new(Hub::default()),
        })
    }
}

#[async_trait]
pub trait ToContext {
    async fn to_context(self) -> Result<Context, StartupError>;
}

#[async_trait]
impl ToContext for Config {
    async fn to_context(self) -> Result<Context, StartupError> {
        let db_conn = database::connect(&self.database).await?;
        database::migrate(&db_conn).await?;

        let google = match self.google.clone() {
            Some(google) => Some(google.into_context()?),
            None => {
                tracing::warn!("GOOGLE_FCM_CREDENTIALS not set, push notifications are disabled");
                None
            }
        };

        if self.payment.is_none() {
            tracing::warn!("Razorpay keys not set, online payments are disabled");
        }

        Context::new(self, db_conn, google)
    }
}
