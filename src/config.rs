// config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway_key_id: String,
    pub gateway_key_secret: String,
    pub gateway_webhook_secret: Option<String>,
    pub gateway_environment: String,
    pub public_base_url: String,
    pub database_url: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let gateway_environment =
            env::var("GATEWAY_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string());

        AppConfig {
            gateway_key_id: env::var("GATEWAY_KEY_ID")
                .expect("GATEWAY_KEY_ID must be set"),
            gateway_key_secret: env::var("GATEWAY_KEY_SECRET")
                .expect("GATEWAY_KEY_SECRET must be set"),
            // Optional: webhook signature checking is skipped when unset
            gateway_webhook_secret: env::var("GATEWAY_WEBHOOK_SECRET").ok(),
            gateway_environment,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .expect("PUBLIC_BASE_URL must be set"),
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        }
    }

    pub fn gateway_base_url(&self) -> String {
        env::var("GATEWAY_BASE_URL")
            .unwrap_or_else(|_| "https://api.razorpay.com".to_string())
    }

    pub fn is_production(&self) -> bool {
        self.gateway_environment == "production"
    }

    /// Callback URL registered with the gateway at link creation.
    pub fn callback_url(&self, payment_id: &str) -> String {
        format!(
            "{}/api/payments/{}/callback",
            self.public_base_url.trim_end_matches('/'),
            payment_id
        )
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "environment": self.gateway_environment,
            "is_production": self.is_production(),
            "gateway_base_url": self.gateway_base_url(),
            "public_base_url": self.public_base_url,
            "key_id_set": !self.gateway_key_id.is_empty(),
            "key_secret_set": !self.gateway_key_secret.is_empty(),
            "webhook_secret_set": self.gateway_webhook_secret.is_some(),
            "port": self.port,
            "host": self.host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            gateway_key_id: "rzp_test_key".to_string(),
            gateway_key_secret: "secret".to_string(),
            gateway_webhook_secret: None,
            gateway_environment: "sandbox".to_string(),
            public_base_url: "https://pay.example.com/".to_string(),
            database_url: "mongodb://localhost:27017".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }

    #[test]
    fn callback_url_strips_trailing_slash() {
        let config = test_config();
        assert_eq!(
            config.callback_url("abc-123"),
            "https://pay.example.com/api/payments/abc-123/callback"
        );
    }

    #[test]
    fn sandbox_is_not_production() {
        assert!(!test_config().is_production());
    }
}
