use super::parsing::{
    default_document_extensions, env_optional, env_or_default, is_supported_document_extension,
    parse_bool, parse_cors_origins, parse_environment, parse_string_list, parse_u16, parse_u64,
    parse_usize,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, QuizSettings,
    RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, StorageSettings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("STUDYBUDDY_HOST", "0.0.0.0");
        let port = env_or_default("STUDYBUDDY_PORT", "8000");

        let environment = parse_environment(
            env_optional("STUDYBUDDY_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("STUDYBUDDY_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Smart Study Buddy API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "1440"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "studybuddy");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "studybuddy_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let ai_api_key = env_or_default("AI_API_KEY", "");
        let ai_base_url = env_or_default("AI_BASE_URL", "https://api.groq.com/openai/v1");
        let ai_model = env_or_default("AI_MODEL", "llama3-8b-8192");
        let ai_request_timeout_seconds =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "30"))?;
        let ai_max_concurrency =
            parse_usize("AI_MAX_CONCURRENCY", env_or_default("AI_MAX_CONCURRENCY", "3"))?;

        let quiz_max_questions =
            parse_usize("QUIZ_MAX_QUESTIONS", env_or_default("QUIZ_MAX_QUESTIONS", "20"))?;
        let quiz_min_source_chars =
            parse_usize("QUIZ_MIN_SOURCE_CHARS", env_or_default("QUIZ_MIN_SOURCE_CHARS", "100"))?;
        let quiz_prompt_char_limit = parse_usize(
            "QUIZ_PROMPT_CHAR_LIMIT",
            env_or_default("QUIZ_PROMPT_CHAR_LIMIT", "1500"),
        )?;
        let quiz_generation_rate_limit = parse_u64(
            "QUIZ_GENERATION_RATE_LIMIT",
            env_or_default("QUIZ_GENERATION_RATE_LIMIT", "10"),
        )?;
        let quiz_generation_rate_window_seconds = parse_u64(
            "QUIZ_GENERATION_RATE_WINDOW_SECONDS",
            env_or_default("QUIZ_GENERATION_RATE_WINDOW_SECONDS", "60"),
        )?;

        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;
        let allowed_document_extensions = parse_string_list(
            env_optional("ALLOWED_DOCUMENT_EXTENSIONS"),
            default_document_extensions(),
        );

        let log_level = env_or_default("STUDYBUDDY_LOG_LEVEL", "info");
        let json = env_optional("STUDYBUDDY_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                api_key: ai_api_key,
                base_url: ai_base_url,
                model: ai_model,
                request_timeout_seconds: ai_request_timeout_seconds,
                max_concurrency: ai_max_concurrency,
            },
            quiz: QuizSettings {
                max_questions: quiz_max_questions,
                min_source_chars: quiz_min_source_chars,
                prompt_char_limit: quiz_prompt_char_limit,
                generation_rate_limit: quiz_generation_rate_limit,
                generation_rate_window_seconds: quiz_generation_rate_window_seconds,
            },
            storage: StorageSettings { max_upload_size_mb, allowed_document_extensions },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.allowed_document_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ALLOWED_DOCUMENT_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.storage.allowed_document_extensions {
            if !is_supported_document_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_DOCUMENT_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if self.quiz.max_questions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_MAX_QUESTIONS",
                value: "0".to_string(),
            });
        }

        if self.quiz.prompt_char_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_PROMPT_CHAR_LIMIT",
                value: "0".to_string(),
            });
        }

        if self.ai.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_MAX_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        if self.ai.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_REQUEST_TIMEOUT",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("AI_API_KEY"));
        }
        if self.ai.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("AI_BASE_URL"));
        }

        Ok(())
    }
}
