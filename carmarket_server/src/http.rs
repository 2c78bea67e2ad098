//! HTTP API serving the aggregate views and spreadsheet uploads.

use std::{convert::Infallible, sync::Arc};

use bytes::{Bytes, BytesMut};
use carmarket_client::Gateway;
use carmarket_sql::Select;
use carmarket_types::{CAR_DATA_SCHEMA, Status};
use futures::{future, stream};
use hyper::{
    Body, Method, Request, Response, StatusCode,
    body::HttpBody,
    header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_MAX_AGE, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue,
    },
};
use multer::Multipart;
use observability_deps::tracing::{debug, error, info};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    analytics::{self, CarView, CityMetric, InvalidMetric, RecommendationFilter, TrendMetric},
    mapping::{UploadError, UploadFormat, records_from_upload},
};

/// Multipart field carrying an uploaded spreadsheet
pub const UPLOAD_FIELD: &str = "excelFile";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested path has no handler
    #[error("not found")]
    NoHandler,

    #[error("Invalid metric")]
    InvalidMetric(#[from] InvalidMetric),

    #[error("Model not found")]
    ModelNotFound,

    #[error("invalid path segment '{segment}': {reason}")]
    InvalidPathSegment { segment: String, reason: String },

    #[error("invalid query string: {0}")]
    InvalidQueryString(#[from] serde_urlencoded::de::Error),

    #[error("error reading request body: {0}")]
    ClientHangup(#[source] hyper::Error),

    #[error("max request size ({0} bytes) exceeded")]
    RequestSizeExceeded(usize),

    #[error("invalid multipart form: {0}")]
    InvalidMultipart(#[from] multer::Error),

    #[error("No file part")]
    MissingFilePart,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("Invalid file format")]
    InvalidFileFormat { file_name: String },

    #[error("Excel file is empty")]
    EmptyUpload,

    #[error("Invalid Excel file content: {0}")]
    InvalidSpreadsheet(#[from] UploadError),

    /// The gateway returned an error envelope
    #[error("{0}")]
    Warehouse(String),

    #[error("failed to encode response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Self::NoHandler | Self::ModelNotFound => StatusCode::NOT_FOUND,
            Self::InvalidMetric(_)
            | Self::InvalidPathSegment { .. }
            | Self::InvalidQueryString(_)
            | Self::InvalidMultipart(_)
            | Self::MissingFilePart
            | Self::NoSelectedFile
            | Self::InvalidFileFormat { .. }
            | Self::EmptyUpload
            | Self::InvalidSpreadsheet(_)
            | Self::ClientHangup(_) => StatusCode::BAD_REQUEST,
            Self::RequestSizeExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Warehouse(_) | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `{"error": <message>}` with the matching status code
    fn into_response(self) -> Response<Body> {
        let body = json!({ "error": self.to_string() }).to_string();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

/// Shared state of the HTTP handlers
#[derive(Debug)]
pub struct HttpApi {
    gateway: Gateway,
    table: String,
    max_request_bytes: usize,
}

impl HttpApi {
    pub fn new(gateway: Gateway, table: impl Into<String>, max_request_bytes: usize) -> Self {
        Self {
            gateway,
            table: table.into(),
            max_request_bytes,
        }
    }

    /// Every listing in the table, projected for presentation
    async fn cars(&self) -> Result<Vec<CarView>> {
        let rows = self
            .gateway
            .select(&self.table, &Select::new(), &CAR_DATA_SCHEMA)
            .await
            .into_rows()
            .map_err(Error::Warehouse)?;
        Ok(rows.iter().map(CarView::from_record).collect())
    }

    async fn brands(&self) -> Result<Response<Body>> {
        let cars = self.cars().await?;
        json_response(&json!({ "brands": analytics::brands(&cars) }))
    }

    async fn brand_models(&self, brand: &str) -> Result<Response<Body>> {
        let cars = self.cars().await?;
        json_response(&json!({ "models": analytics::brand_models(&cars, brand) }))
    }

    async fn model_details(&self, model_id: &str) -> Result<Response<Body>> {
        let cars = self.cars().await?;
        let details = analytics::model_details(&cars, model_id).ok_or(Error::ModelNotFound)?;
        json_response(details)
    }

    async fn cities(&self) -> Result<Response<Body>> {
        let cities = analytics::city_totals(&self.cars().await?);
        let cities: Vec<_> = cities
            .into_iter()
            .map(|city| json!({ "id": city.id, "name": city.city }))
            .collect();
        json_response(&json!({ "cities": cities }))
    }

    async fn city_rankings(&self, req: &Request<Body>) -> Result<Response<Body>> {
        let params: MetricParams = query_params(req)?;
        let metric: CityMetric = params
            .metric
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();

        let cities = analytics::city_totals(&self.cars().await?);
        let rankings: Vec<_> = analytics::city_rankings(&cities, metric)
            .into_iter()
            .map(|(city, value)| {
                let mut entry = serde_json::Map::new();
                entry.insert("city".to_string(), city.into());
                entry.insert(metric.name().to_string(), value.into());
                entry
            })
            .collect();
        json_response(&json!({ "rankings": rankings }))
    }

    async fn recommendations(&self, req: &Request<Body>) -> Result<Response<Body>> {
        let params: RecommendationParams = query_params(req)?;
        let cars = self.cars().await?;
        let recommendations = analytics::recommendations(&cars, &params.into());
        json_response(&json!({ "recommendations": recommendations }))
    }

    async fn market_overview(&self) -> Result<Response<Body>> {
        let cars = self.cars().await?;
        let cities = analytics::city_totals(&cars);
        json_response(&analytics::market_overview(&cars, &cities))
    }

    async fn market_trends(&self, req: &Request<Body>) -> Result<Response<Body>> {
        let params: MetricParams = query_params(req)?;
        let metric: TrendMetric = params
            .metric
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();

        let points = analytics::market_trends(&self.cars().await?);
        json_response(&json!({
            "metric": metric.name(),
            "granularity": "yearly",
            "data": analytics::trend_series(&points, metric),
        }))
    }

    async fn price_distribution(&self) -> Result<Response<Body>> {
        let cars = self.cars().await?;
        json_response(&json!({ "distribution": analytics::price_distribution(&cars) }))
    }

    async fn consumer_preferences(&self, req: &Request<Body>) -> Result<Response<Body>> {
        let params: DimensionParams = query_params(req)?;
        match params.dimension.as_deref().unwrap_or("type") {
            "type" => json_response(&analytics::type_preferences(&self.cars().await?)),
            _ => json_response(&analytics::horsepower_preferences()),
        }
    }

    /// Insert the rows of the spreadsheet sent as the [`UPLOAD_FIELD`] of a
    /// multipart form, its headers using presentation names
    async fn upload(&self, req: Request<Body>) -> Result<Response<Body>> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let boundary = multer::parse_boundary(content_type)?;
        let body = self.read_body(req).await?;

        let mut multipart = Multipart::new(
            stream::once(future::ready(Ok::<_, Infallible>(body))),
            boundary,
        );
        let (file_name, data) = loop {
            let Some(field) = multipart.next_field().await? else {
                return Err(Error::MissingFilePart);
            };
            if field.name() == Some(UPLOAD_FIELD) {
                let file_name = field.file_name().unwrap_or_default().to_string();
                break (file_name, field.bytes().await?);
            }
        };

        if file_name.is_empty() {
            return Err(Error::NoSelectedFile);
        }
        let format = UploadFormat::from_file_name(&file_name)
            .ok_or_else(|| Error::InvalidFileFormat {
                file_name: file_name.clone(),
            })?;
        let records = records_from_upload(format, &data, &CAR_DATA_SCHEMA)?;
        if records.is_empty() {
            return Err(Error::EmptyUpload);
        }

        info!(rows = records.len(), %file_name, table = %self.table, "uploading spreadsheet");
        let envelope = self
            .gateway
            .insert(&self.table, &records, &CAR_DATA_SCHEMA)
            .await;
        match envelope.status {
            Status::Error => Err(Error::Warehouse(envelope.message.unwrap_or_default())),
            Status::Success | Status::Warning => json_response(&envelope),
        }
    }

    /// Collect the request body, refusing anything over the configured size
    async fn read_body(&self, req: Request<Body>) -> Result<Bytes> {
        let content_length = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        let mut body = match content_length {
            Some(len) if len <= self.max_request_bytes => BytesMut::with_capacity(len),
            _ => BytesMut::new(),
        };

        let mut payload = req.into_body();
        while let Some(chunk) = payload.data().await {
            let chunk = chunk.map_err(Error::ClientHangup)?;
            if body.len() + chunk.len() > self.max_request_bytes {
                return Err(Error::RequestSizeExceeded(self.max_request_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

#[derive(Debug, Default, Deserialize)]
struct MetricParams {
    metric: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DimensionParams {
    dimension: Option<String>,
}

/// Recommendation filters as sent by the browser; numbers that fail to parse are ignored
#[derive(Debug, Default, Deserialize)]
struct RecommendationParams {
    brand: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
    min_hp: Option<String>,
    doors: Option<String>,
    car_type: Option<String>,
}

impl From<RecommendationParams> for RecommendationFilter {
    fn from(params: RecommendationParams) -> Self {
        fn number<T: std::str::FromStr>(s: Option<String>) -> Option<T> {
            s?.trim().parse().ok()
        }
        Self {
            brand: params.brand,
            min_price: number(params.min_price),
            max_price: number(params.max_price),
            min_hp: number(params.min_hp),
            doors: number(params.doors),
            car_type: params.car_type,
        }
    }
}

fn query_params<T: DeserializeOwned>(req: &Request<Body>) -> Result<T> {
    Ok(serde_urlencoded::from_str(req.uri().query().unwrap_or_default())?)
}

fn json_response<T: Serialize + ?Sized>(value: &T) -> Result<Response<Body>> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

fn path_segment(segment: &str) -> Result<String> {
    urlencoding::decode(segment)
        .map(|s| s.to_string())
        .map_err(|e| Error::InvalidPathSegment {
            segment: segment.to_string(),
            reason: e.to_string(),
        })
}

fn health() -> Response<Body> {
    let mut response = Response::new(Body::from("OK"));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Permissive CORS preflight answer, cacheable for a day
fn preflight() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

pub async fn route_request(
    http_server: Arc<HttpApi>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, "processing request");

    let mut response = match perform_routing(&http_server, req).await {
        Ok(response) => {
            debug!(status = %response.status(), "successfully processed request");
            response
        }
        Err(error) => {
            if error.status().is_server_error() {
                error!(%error, %method, %uri, "error while handling request");
            } else {
                debug!(%error, %method, %uri, "error while handling request");
            }
            error.into_response()
        }
    };

    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Ok(response)
}

async fn perform_routing(http_server: &HttpApi, req: Request<Body>) -> Result<Response<Body>> {
    let method = req.method().clone();
    if method == Method::OPTIONS {
        info!(uri = %req.uri(), "preflight request");
        return Ok(preflight());
    }

    let uri = req.uri().clone();
    let path = uri.path().trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').skip(1).collect();

    match (method, segments.as_slice()) {
        (Method::GET, ["health"]) => Ok(health()),
        (Method::GET, ["api", "v1", "brands"]) => http_server.brands().await,
        (Method::GET, ["api", "v1", "brands", brand, "models"]) => {
            http_server.brand_models(&path_segment(brand)?).await
        }
        (Method::GET, ["api", "v1", "models", model_id]) => {
            http_server.model_details(&path_segment(model_id)?).await
        }
        (Method::GET, ["api", "v1", "cities"]) => http_server.cities().await,
        (Method::GET, ["api", "v1", "cities", "rankings"]) => http_server.city_rankings(&req).await,
        (Method::GET, ["api", "v1", "recommendations"]) => {
            http_server.recommendations(&req).await
        }
        (Method::GET, ["api", "v1", "market", "overview"]) => http_server.market_overview().await,
        (Method::GET, ["api", "v1", "market", "trends"]) => http_server.market_trends(&req).await,
        (Method::GET, ["api", "v1", "market", "price_distribution"]) => {
            http_server.price_distribution().await
        }
        (Method::GET, ["api", "v1", "consumer_insights", "preferences"]) => {
            http_server.consumer_preferences(&req).await
        }
        (Method::POST, ["api", "v1", "upload", "excel"]) => http_server.upload(req).await,
        _ => Err(Error::NoHandler),
    }
}

#[cfg(test)]
mod tests {
    use carmarket_client::{ResultSet, mock::MockConnector};
    use pretty_assertions::assert_eq;
    use serde_json::Value as JsonValue;

    use super::*;
    use crate::mapping::test_util::workbook;

    const COLUMNS: [&str; 8] = [
        "car_data.car_brand",
        "car_data.car_model",
        "car_data.city",
        "car_data.min_reference_price",
        "car_data.popularity",
        "car_data.car_type",
        "car_data.manufacture_year",
        "car_data.city_license_plates",
    ];

    fn listings() -> ResultSet {
        ResultSet::new(COLUMNS)
            .with_row(vec![
                json!("丰田"),
                json!("Model 3"),
                json!("北京"),
                json!("95000.00"),
                json!(300),
                json!("轿车"),
                json!(2022),
                json!("{\"北京\":100,\"上海\":50}"),
            ])
            .with_row(vec![
                json!("特斯拉"),
                json!("Model Y"),
                json!("上海"),
                json!("280000.00"),
                json!(900),
                json!("新能源"),
                json!(2023),
                json!("{\"上海\":150}"),
            ])
    }

    fn api(connector: &MockConnector) -> Arc<HttpApi> {
        let gateway = Gateway::with_connector("default", Arc::new(connector.clone()));
        Arc::new(HttpApi::new(gateway, "car_data", 64 * 1024))
    }

    async fn call(api: &Arc<HttpApi>, req: Request<Body>) -> (StatusCode, Response<Body>) {
        let response = route_request(Arc::clone(api), req).await.unwrap();
        (response.status(), response)
    }

    async fn get_json(api: &Arc<HttpApi>, uri: &str) -> (StatusCode, JsonValue) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let (status, response) = call(api, req).await;
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test_log::test(tokio::test)]
    async fn health_and_preflight() {
        let api = api(&MockConnector::new());

        let req = Request::get("/health").body(Body::empty()).unwrap();
        let (status, response) = call(&api, req).await;
        assert_eq!(status, StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body.as_ref(), b"OK");

        let req = Request::options("/api/v1/brands")
            .body(Body::empty())
            .unwrap();
        let (status, response) = call(&api, req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(ACCESS_CONTROL_MAX_AGE).unwrap(), "86400");
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[test_log::test(tokio::test)]
    async fn catalog_endpoints() {
        let connector = MockConnector::new();
        connector.push_rows(listings());
        connector.push_rows(listings());
        connector.push_rows(listings());
        let api = api(&connector);

        let (status, body) = get_json(&api, "/api/v1/brands").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "brands": ["丰田", "特斯拉"] }));

        let (_, body) = get_json(&api, "/api/v1/brands/%E4%B8%B0%E7%94%B0/models").await;
        assert_eq!(
            body,
            json!({ "models": [{ "id": "丰田_Model_3", "name": "Model 3" }] })
        );

        let (status, body) = get_json(&api, "/api/v1/models/%E7%89%B9%E6%96%AF%E6%8B%89_Model_Y").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attention"], 900);
        assert_eq!(body["min_price"], 280000.0);
        assert!(body.get("id").is_none());

        assert_eq!(
            connector.statements(),
            vec!["SELECT * FROM default.car_data"; 3]
        );
    }

    #[test_log::test(tokio::test)]
    async fn unknown_model_is_404() {
        let connector = MockConnector::new();
        connector.push_rows(listings());
        let api = api(&connector);

        let (status, body) = get_json(&api, "/api/v1/models/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Model not found" }));
    }

    #[test_log::test(tokio::test)]
    async fn city_rankings() {
        let connector = MockConnector::new();
        connector.push_rows(listings());
        let api = api(&connector);

        let (status, body) = get_json(&api, "/api/v1/cities/rankings?metric=registrations").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "rankings": [
                { "city": "上海", "registrations": 200 },
                { "city": "北京", "registrations": 100 },
            ]})
        );

        let (status, body) = get_json(&api, "/api/v1/cities/rankings?metric=speed").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid metric" }));
        assert_eq!(connector.statements().len(), 1, "invalid metric never reads");
    }

    #[test_log::test(tokio::test)]
    async fn recommendations_ignore_unparseable_numbers() {
        let connector = MockConnector::new();
        connector.push_rows(listings());
        let api = api(&connector);

        let (_, body) =
            get_json(&api, "/api/v1/recommendations?brand=&min_hp=&max_price=100000").await;
        let ids: Vec<_> = body["recommendations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["丰田_Model_3"]);
    }

    #[test_log::test(tokio::test)]
    async fn market_views() {
        let connector = MockConnector::new();
        connector.push_rows(listings());
        connector.push_rows(listings());
        let api = api(&connector);

        let (_, body) = get_json(&api, "/api/v1/market/trends?metric=attention").await;
        assert_eq!(
            body,
            json!({
                "metric": "attention",
                "granularity": "yearly",
                "data": [
                    { "date": "2022", "value": 300 },
                    { "date": "2023", "value": 900 },
                ],
            })
        );

        let (_, body) = get_json(&api, "/api/v1/market/overview").await;
        assert_eq!(body["total_registrations"], 300);
        assert_eq!(body["top_car"], "特斯拉 Model Y (关注度: 900)");

        let (_, body) = get_json(&api, "/api/v1/consumer_insights/preferences?dimension=hp").await;
        assert_eq!(body[0], json!({ "range": "100-150马力", "preference": 0.4 }));
    }

    #[test_log::test(tokio::test)]
    async fn warehouse_failure_is_500() {
        let connector = MockConnector::new();
        connector.push_error("connection reset");
        let api = api(&connector);

        let (status, body) = get_json(&api, "/api/v1/market/price_distribution").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("failed to read table 'car_data'"),
            "{body}"
        );
    }

    const BOUNDARY: &str = "carmarket-form-boundary";

    /// A multipart upload holding one file field
    fn upload_request(field: &str, file_name: &str, contents: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::post("/api/v1/upload/excel")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn upload_json(api: &Arc<HttpApi>, req: Request<Body>) -> (StatusCode, JsonValue) {
        let (status, response) = call(api, req).await;
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test_log::test(tokio::test)]
    async fn upload_inserts_workbook_rows() {
        let connector = MockConnector::new();
        let api = api(&connector);

        let workbook = workbook(&[
            &["brand", "model", "guide_price", "doors", "city"],
            &["丰田", "卡罗拉", "120000.5", "4", "北京"],
            &["特斯拉", "Model Y", "263900", "5", "上海"],
        ]);
        let (status, body) = upload_json(&api, upload_request(UPLOAD_FIELD, "cars.xlsx", &workbook)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "success");

        let statements = connector.statements();
        assert_eq!(statements.len(), 1);
        assert!(
            statements[0].starts_with("INSERT INTO TABLE default.car_data VALUES ('丰田', '北京', '卡罗拉', 120000.5, NULL, 4,"),
            "{}",
            statements[0]
        );
        assert!(
            statements[0].contains("('特斯拉', '上海', 'Model Y', 263900, NULL, 5,"),
            "{}",
            statements[0]
        );
    }

    #[test_log::test(tokio::test)]
    async fn upload_accepts_csv_files() {
        let connector = MockConnector::new();
        let api = api(&connector);

        let csv = "brand,model,doors,city\n丰田,卡罗拉,4,北京\n";
        let (status, body) =
            upload_json(&api, upload_request(UPLOAD_FIELD, "cars.CSV", csv.as_bytes())).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let statements = connector.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("'丰田', '北京', '卡罗拉'"), "{}", statements[0]);
    }

    #[test_log::test(tokio::test)]
    async fn empty_uploads_are_rejected() {
        let connector = MockConnector::new();
        let api = api(&connector);

        let header_only_workbook = workbook(&[&["brand", "model", "city"]]);
        for (file_name, contents) in [
            ("cars.csv", b"brand,model,city\n".to_vec()),
            ("cars.csv", vec![]),
            ("cars.xlsx", header_only_workbook),
        ] {
            let (status, body) =
                upload_json(&api, upload_request(UPLOAD_FIELD, file_name, &contents)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{file_name}");
            assert_eq!(body, json!({ "error": "Excel file is empty" }));
        }
        assert!(connector.statements().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn bad_uploads() {
        let connector = MockConnector::new();
        let api = api(&connector);
        let csv = b"brand\n\xE4\xB8\xB0\xE7\x94\xB0\n";

        for (req, error) in [
            (upload_request("file", "cars.csv", csv), "No file part"),
            (upload_request(UPLOAD_FIELD, "", csv), "No selected file"),
            (upload_request(UPLOAD_FIELD, "cars.txt", csv), "Invalid file format"),
        ] {
            let (status, body) = upload_json(&api, req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, json!({ "error": error }));
        }

        let (status, body) =
            upload_json(&api, upload_request(UPLOAD_FIELD, "cars.xlsx", csv)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid Excel file content"),
            "{body}"
        );

        let req = Request::post("/api/v1/upload/excel")
            .body(Body::from(csv.to_vec()))
            .unwrap();
        let (status, _) = call(&api, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "not a multipart form");

        let oversized = "brand\n".to_string() + &"丰田\n".repeat(16 * 1024);
        let req = upload_request(UPLOAD_FIELD, "cars.csv", oversized.as_bytes());
        let (status, _) = call(&api, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let req = Request::delete("/api/v1/upload/excel")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&api, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(connector.statements().is_empty());
    }
}
