//! Warehouse connection arguments.

use carmarket_client::{
    AuthMechanism, WarehouseConfig,
    config::{DEFAULT_DATABASE, DEFAULT_WAREHOUSE_HOST, DEFAULT_WAREHOUSE_PORT},
};
use carmarket_types::CAR_DATA_TABLE;
use secrecy::Secret;

/// Where the listings table lives and how to log in to it
#[derive(Debug, Clone, clap::Parser)]
pub struct WarehouseArgs {
    /// Host of the warehouse REST endpoint
    #[clap(
        long = "warehouse-host",
        env = "CARMARKET_WAREHOUSE_HOST",
        default_value = DEFAULT_WAREHOUSE_HOST,
        action
    )]
    pub host: String,

    #[clap(
        long = "warehouse-port",
        env = "CARMARKET_WAREHOUSE_PORT",
        default_value_t = DEFAULT_WAREHOUSE_PORT,
        action
    )]
    pub port: u16,

    /// One of NOSASL (or NONE), PLAIN, LDAP, KERBEROS
    #[clap(
        long = "warehouse-auth",
        env = "CARMARKET_WAREHOUSE_AUTH",
        default_value = "PLAIN",
        action
    )]
    pub auth_mechanism: AuthMechanism,

    #[clap(long = "warehouse-user", env = "CARMARKET_WAREHOUSE_USER", action)]
    pub username: Option<String>,

    #[clap(
        long = "warehouse-password",
        env = "CARMARKET_WAREHOUSE_PASSWORD",
        hide_env_values = true,
        action
    )]
    pub password: Option<Secret<String>>,

    /// Database holding the listings table
    #[clap(
        short = 'd',
        long = "database",
        env = "CARMARKET_DATABASE",
        default_value = DEFAULT_DATABASE,
        action
    )]
    pub database: String,

    /// Talk to the warehouse over https
    #[clap(long = "warehouse-tls", env = "CARMARKET_WAREHOUSE_TLS", action)]
    pub use_tls: bool,

    /// Name of the listings table
    #[clap(
        long = "table",
        env = "CARMARKET_TABLE",
        default_value = CAR_DATA_TABLE,
        action
    )]
    pub table: String,
}

impl WarehouseArgs {
    pub fn warehouse_config(&self) -> WarehouseConfig {
        WarehouseConfig {
            host: self.host.clone(),
            port: self.port,
            auth_mechanism: self.auth_mechanism,
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            use_tls: self.use_tls,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults() {
        let args = WarehouseArgs::try_parse_from(["carmarket"]).unwrap();
        let config = args.warehouse_config();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 10099);
        assert_eq!(config.auth_mechanism, AuthMechanism::Plain);
        assert_eq!(config.database, "default");
        assert!(config.password.is_none());
        assert!(!config.use_tls);
        assert_eq!(args.table, "car_data");
    }

    #[test]
    fn explicit_flags() {
        let args = WarehouseArgs::try_parse_from([
            "carmarket",
            "--warehouse-host",
            "hive.internal",
            "--warehouse-port",
            "10009",
            "--warehouse-auth",
            "ldap",
            "--warehouse-user",
            "analyst",
            "--warehouse-password",
            "s3cret",
            "-d",
            "market",
            "--warehouse-tls",
            "--table",
            "listings",
        ])
        .unwrap();
        let config = args.warehouse_config();
        assert_eq!(config.host, "hive.internal");
        assert_eq!(config.port, 10009);
        assert_eq!(config.auth_mechanism, AuthMechanism::Ldap);
        assert_eq!(config.username.as_deref(), Some("analyst"));
        assert_eq!(
            config.password.as_ref().map(|p| p.expose_secret().as_str()),
            Some("s3cret")
        );
        assert_eq!(config.database, "market");
        assert!(config.use_tls);
        assert_eq!(args.table, "listings");

        assert!(
            WarehouseArgs::try_parse_from(["carmarket", "--warehouse-auth", "GSSAPI"]).is_err()
        );
    }
}
