use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub admin_email: String,
    pub admin_password: String,
    pub checkout: CheckoutConfig,
}

/// Settings handed to the hosted checkout widget.
#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    pub key_id: String,
    pub currency: String,
    pub business_name: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            currency: "INR".to_string(),
            business_name: "VroomGo Rentals".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = CheckoutConfig::default();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@vroomgo.com".to_string()),
            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin123".to_string()),
            checkout: CheckoutConfig {
                key_id: env::var("CHECKOUT_KEY_ID").unwrap_or(defaults.key_id),
                currency: env::var("CHECKOUT_CURRENCY").unwrap_or(defaults.currency),
                business_name: env::var("BUSINESS_NAME").unwrap_or(defaults.business_name),
            },
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
