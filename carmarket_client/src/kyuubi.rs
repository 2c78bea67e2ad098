//! [`Connector`] for a HiveServer2-compatible engine fronted by the Kyuubi
//! REST API.
//!
//! One connection is one REST session. Statements run synchronously on the
//! server; the operation's event is polled until it reaches a terminal state,
//! then the result set is paged through.

use std::time::Duration;

use async_trait::async_trait;
use observability_deps::tracing::{debug, warn};
use reqwest::{Method, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value as JsonValue, json};
use url::Url;

use crate::{
    AuthMechanism, Error, Result, WarehouseConfig,
    connection::{Connection, Connector, ResultSet},
};

/// Password sent for `PLAIN` auth when none is configured, as HiveServer2 clients do
const ANONYMOUS: &str = "anonymous";

pub const DEFAULT_FETCH_SIZE: usize = 1000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct KyuubiConnector {
    base_url: Url,
    database: String,
    auth_mechanism: AuthMechanism,
    username: Option<String>,
    password: Option<Secret<String>>,
    http_client: reqwest::Client,
    fetch_size: usize,
    poll_interval: Duration,
}

impl KyuubiConnector {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url()?,
            database: config.database.clone(),
            auth_mechanism: config.auth_mechanism,
            username: config.username.clone(),
            password: config.password.clone(),
            http_client: reqwest::Client::new(),
            fetch_size: DEFAULT_FETCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Maximum rows requested per result page
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn credentials(&self) -> Result<Option<Credentials>> {
        let username = || self.username.clone().unwrap_or_else(|| ANONYMOUS.to_string());
        match self.auth_mechanism {
            AuthMechanism::NoSasl => Ok(None),
            AuthMechanism::Plain => Ok(Some(Credentials {
                username: username(),
                password: self
                    .password
                    .clone()
                    .unwrap_or_else(|| Secret::new(ANONYMOUS.to_string())),
            })),
            AuthMechanism::Ldap => match &self.password {
                Some(password) => Ok(Some(Credentials {
                    username: username(),
                    password: password.clone(),
                })),
                None => Err(Error::MissingPassword(self.auth_mechanism)),
            },
            AuthMechanism::Kerberos => Err(Error::UnsupportedAuth(self.auth_mechanism)),
        }
    }
}

#[async_trait]
impl Connector for KyuubiConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let transport = Transport {
            base_url: self.base_url.clone(),
            credentials: self.credentials()?,
            http_client: self.http_client.clone(),
        };
        let handle: Handle = transport
            .call_json(
                Method::POST,
                "/api/v1/sessions",
                Some(json!({
                    "configs": {
                        "use:database": self.database,
                        "hive.resultset.use.unique.column.names": "false",
                    }
                })),
            )
            .await?;
        debug!(session = %handle.identifier, database = %self.database, "opened warehouse session");

        Ok(Box::new(KyuubiSession {
            transport,
            session: handle.identifier,
            operations: vec![],
            fetch_size: self.fetch_size,
            poll_interval: self.poll_interval,
        }))
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: Secret<String>,
}

#[derive(Debug, Clone)]
struct Transport {
    base_url: Url,
    credentials: Option<Credentials>,
    http_client: reqwest::Client,
}

impl Transport {
    async fn call(&self, method: Method, path: &str, body: Option<JsonValue>) -> Result<Response> {
        let url = self.base_url.join(path)?;
        let mut req = self.http_client.request(method.clone(), url);
        if let Some(credentials) = &self.credentials {
            req = req.basic_auth(
                &credentials.username,
                Some(credentials.password.expose_secret()),
            );
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|src| Error::request_send(method, path, src))?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(Error::ApiError {
                code: status,
                message: resp.text().await.map_err(Error::Text)?,
            })
        }
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<T> {
        self.call(method, path, body)
            .await?
            .json()
            .await
            .map_err(Error::Json)
    }
}

#[derive(Debug, Deserialize)]
struct Handle {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct OperationEvent {
    state: String,
    #[serde(default)]
    exception: Option<String>,
}

const FINISHED_STATE: &str = "FINISHED_STATE";

/// Non-terminal operation states
fn is_running(state: &str) -> bool {
    matches!(
        state,
        "INITIALIZED_STATE" | "PENDING_STATE" | "COMPILED_STATE" | "RUNNING_STATE"
    )
}

#[derive(Debug, Deserialize)]
struct ResultSetMetadata {
    #[serde(default)]
    columns: Vec<ColumnDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnDesc {
    column_name: String,
}

#[derive(Debug, Deserialize)]
struct RowSet {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct Field {
    #[serde(default)]
    value: JsonValue,
}

#[derive(Debug)]
struct KyuubiSession {
    transport: Transport,
    session: String,
    /// Operations opened in this session, closed with it
    operations: Vec<String>,
    fetch_size: usize,
    poll_interval: Duration,
}

impl KyuubiSession {
    async fn wait_for_completion(&self, operation: &str) -> Result<()> {
        let path = format!("/api/v1/operations/{operation}/event");
        loop {
            let event: OperationEvent = self.transport.call_json(Method::GET, &path, None).await?;
            if is_running(&event.state) {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            if event.state == FINISHED_STATE {
                return Ok(());
            }
            return Err(Error::Statement {
                state: event.state,
                message: event
                    .exception
                    .unwrap_or_else(|| "no error detail returned".to_string()),
            });
        }
    }

    async fn fetch(&self, operation: &str) -> Result<ResultSet> {
        let metadata: ResultSetMetadata = self
            .transport
            .call_json(
                Method::GET,
                &format!("/api/v1/operations/{operation}/resultsetmetadata"),
                None,
            )
            .await?;
        let mut result = ResultSet::new(metadata.columns.into_iter().map(|c| c.column_name));
        if result.columns.is_empty() {
            return Ok(result);
        }

        let path = format!(
            "/api/v1/operations/{operation}/rowset?maxrows={}&fetchorientation=FETCH_NEXT",
            self.fetch_size
        );
        loop {
            let page: RowSet = self.transport.call_json(Method::GET, &path, None).await?;
            let page_len = page.rows.len();
            result.rows.extend(
                page.rows
                    .into_iter()
                    .map(|row| row.fields.into_iter().map(|f| f.value).collect()),
            );
            if page_len < self.fetch_size {
                return Ok(result);
            }
        }
    }
}

#[async_trait]
impl Connection for KyuubiSession {
    async fn execute(&mut self, statement: &str) -> Result<ResultSet> {
        let handle: Handle = self
            .transport
            .call_json(
                Method::POST,
                &format!("/api/v1/sessions/{}/operations/statement", self.session),
                Some(json!({
                    "statement": statement,
                    "runAsync": false,
                    "queryTimeout": 0,
                    "confOverlay": {},
                })),
            )
            .await?;
        let operation = handle.identifier;
        self.operations.push(operation.clone());

        self.wait_for_completion(&operation).await?;
        self.fetch(&operation).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut first_error = None;
        for operation in &self.operations {
            let closed = self
                .transport
                .call(
                    Method::PUT,
                    &format!("/api/v1/operations/{operation}"),
                    Some(json!({"action": "close"})),
                )
                .await;
            if let Err(error) = closed {
                warn!(%error, %operation, "failed to close warehouse operation");
                first_error.get_or_insert(error);
            }
        }

        let closed = self
            .transport
            .call(Method::DELETE, &format!("/api/v1/sessions/{}", self.session), None)
            .await;
        debug!(session = %self.session, "closed warehouse session");
        match (first_error, closed) {
            (Some(error), _) => Err(error),
            (None, closed) => closed.map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server, ServerGuard};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn connector(server: &ServerGuard, config: WarehouseConfig) -> KyuubiConnector {
        let url = Url::parse(&server.url()).unwrap();
        let config = WarehouseConfig {
            host: url.host_str().unwrap().to_string(),
            port: url.port().unwrap(),
            ..config
        };
        KyuubiConnector::new(&config)
            .unwrap()
            .with_poll_interval(Duration::from_millis(1))
    }

    async fn mock_open_session(server: &mut ServerGuard, auth: &str) -> mockito::Mock {
        server
            .mock("POST", "/api/v1/sessions")
            .match_header("Authorization", auth)
            .match_body(Matcher::Json(json!({
                "configs": {
                    "use:database": "default",
                    "hive.resultset.use.unique.column.names": "false",
                }
            })))
            .with_status(200)
            .with_body(r#"{"identifier": "session-1"}"#)
            .create_async()
            .await
    }

    async fn mock_release(server: &mut ServerGuard) -> (mockito::Mock, mockito::Mock) {
        let close_operation = server
            .mock("PUT", "/api/v1/operations/op-1")
            .match_body(Matcher::Json(json!({"action": "close"})))
            .with_status(200)
            .create_async()
            .await;
        let close_session = server
            .mock("DELETE", "/api/v1/sessions/session-1")
            .with_status(200)
            .create_async()
            .await;
        (close_operation, close_session)
    }

    #[tokio::test]
    async fn select_round_trip() {
        let mut server = Server::new_async().await;
        let open = mock_open_session(&mut server, "Basic YW5hbHlzdDpzM2NyZXQ=").await;
        let statement = server
            .mock("POST", "/api/v1/sessions/session-1/operations/statement")
            .match_body(Matcher::Json(json!({
                "statement": "SELECT city, city_license_plates FROM default.car_data",
                "runAsync": false,
                "queryTimeout": 0,
                "confOverlay": {},
            })))
            .with_status(200)
            .with_body(r#"{"identifier": "op-1"}"#)
            .create_async()
            .await;
        let event = server
            .mock("GET", "/api/v1/operations/op-1/event")
            .with_status(200)
            .with_body(r#"{"state": "FINISHED_STATE", "exception": null}"#)
            .create_async()
            .await;
        let metadata = server
            .mock("GET", "/api/v1/operations/op-1/resultsetmetadata")
            .with_status(200)
            .with_body(
                r#"{"columns": [
                    {"columnName": "car_data.city", "dataType": "STRING_TYPE"},
                    {"columnName": "car_data.city_license_plates", "dataType": "MAP_TYPE"}
                ]}"#,
            )
            .create_async()
            .await;
        let rowset = server
            .mock("GET", "/api/v1/operations/op-1/rowset")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("maxrows".into(), "1000".into()),
                Matcher::UrlEncoded("fetchorientation".into(), "FETCH_NEXT".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"rows": [
                    {"fields": [
                        {"dataType": "STRING_TYPE", "value": "北京"},
                        {"dataType": "MAP_TYPE", "value": "{\"北京\":1200}"}
                    ]}
                ], "rowCount": 1}"#,
            )
            .create_async()
            .await;
        let (close_operation, close_session) = mock_release(&mut server).await;

        let config =
            WarehouseConfig::default().with_credentials("analyst", Some("s3cret".to_string()));
        let connector = connector(&server, config);
        let mut connection = connector.connect().await.unwrap();
        let result = connection
            .execute("SELECT city, city_license_plates FROM default.car_data")
            .await
            .unwrap();
        connection.close().await.unwrap();

        assert_eq!(
            result,
            ResultSet::new(["car_data.city", "car_data.city_license_plates"])
                .with_row(vec![json!("北京"), json!("{\"北京\":1200}")])
        );
        for mock in [
            open,
            statement,
            event,
            metadata,
            rowset,
            close_operation,
            close_session,
        ] {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn statement_failure_still_releases() {
        let mut server = Server::new_async().await;
        let open = mock_open_session(&mut server, "Basic YW5vbnltb3VzOmFub255bW91cw==").await;
        let _statement = server
            .mock("POST", "/api/v1/sessions/session-1/operations/statement")
            .with_status(200)
            .with_body(r#"{"identifier": "op-1"}"#)
            .create_async()
            .await;
        let _event = server
            .mock("GET", "/api/v1/operations/op-1/event")
            .with_status(200)
            .with_body(
                r#"{"state": "ERROR_STATE", "exception": "Table not found 'default.nope'"}"#,
            )
            .create_async()
            .await;
        let (close_operation, close_session) = mock_release(&mut server).await;

        let connector = connector(&server, WarehouseConfig::default());
        let mut connection = connector.connect().await.unwrap();
        let error = connection
            .execute("SELECT * FROM default.nope")
            .await
            .unwrap_err();
        connection.close().await.unwrap();

        assert!(
            matches!(&error, Error::Statement { state, message }
                if state == "ERROR_STATE" && message == "Table not found 'default.nope'"),
            "unexpected error: {error:?}"
        );
        open.assert_async().await;
        close_operation.assert_async().await;
        close_session.assert_async().await;
    }

    #[tokio::test]
    async fn ddl_has_no_rows_to_fetch() {
        let mut server = Server::new_async().await;
        let open = server
            .mock("POST", "/api/v1/sessions")
            .match_header("Authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"identifier": "session-1"}"#)
            .create_async()
            .await;
        let _statement = server
            .mock("POST", "/api/v1/sessions/session-1/operations/statement")
            .with_status(200)
            .with_body(r#"{"identifier": "op-1"}"#)
            .create_async()
            .await;
        let _event = server
            .mock("GET", "/api/v1/operations/op-1/event")
            .with_status(200)
            .with_body(r#"{"state": "FINISHED_STATE"}"#)
            .create_async()
            .await;
        let _metadata = server
            .mock("GET", "/api/v1/operations/op-1/resultsetmetadata")
            .with_status(200)
            .with_body(r#"{"columns": []}"#)
            .create_async()
            .await;
        let rowset = server
            .mock("GET", "/api/v1/operations/op-1/rowset")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let _release = mock_release(&mut server).await;

        let config = WarehouseConfig::default().with_auth(AuthMechanism::NoSasl);
        let connector = connector(&server, config);
        let mut connection = connector.connect().await.unwrap();
        let result = connection.execute("DROP TABLE IF EXISTS car_data").await;
        connection.close().await.unwrap();

        assert_eq!(result.unwrap(), ResultSet::default());
        open.assert_async().await;
        rowset.assert_async().await;
    }

    #[tokio::test]
    async fn open_session_rejected() {
        let mut server = Server::new_async().await;
        let _open = server
            .mock("POST", "/api/v1/sessions")
            .with_status(401)
            .with_body("bad credentials")
            .create_async()
            .await;

        let connector = connector(&server, WarehouseConfig::default());
        let error = connector.connect().await.map(|_| ()).unwrap_err();
        assert!(
            matches!(&error, Error::ApiError { code, message }
                if code.as_u16() == 401 && message == "bad credentials"),
            "unexpected error: {error:?}"
        );
    }

    #[tokio::test]
    async fn unsupported_auth_fails_before_any_request() {
        let mut server = Server::new_async().await;
        let open = server
            .mock("POST", "/api/v1/sessions")
            .expect(0)
            .create_async()
            .await;

        let kerberos = WarehouseConfig::default().with_auth(AuthMechanism::Kerberos);
        let error = connector(&server, kerberos)
            .connect()
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(error, Error::UnsupportedAuth(AuthMechanism::Kerberos)));

        let ldap = WarehouseConfig::default()
            .with_auth(AuthMechanism::Ldap)
            .with_credentials("analyst", None::<String>);
        let error = connector(&server, ldap)
            .connect()
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(error, Error::MissingPassword(AuthMechanism::Ldap)));

        open.assert_async().await;
    }
}
