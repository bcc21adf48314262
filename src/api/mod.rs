mod form;
mod http;

use anyhow::{anyhow, Result};
use serde_json::json;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::GuestCounterError;
use crate::pipeline::GuestCounter;
use crate::report::{ReportLocale, REPORT_FILE_NAME};

use self::form::parse_process_form;
use self::http::{read_request, HttpRequest, HttpResponse};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const EMPTY_HISTORY_MESSAGE: &str = "No data to export";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
    pub static_dir: PathBuf,
    pub report_locale: ReportLocale,
    pub read_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
            static_dir: PathBuf::from("static"),
            report_locale: ReportLocale::default(),
            read_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    pub fn from_server_config(cfg: &ServerConfig) -> Self {
        Self {
            addr: cfg.api_addr.clone(),
            max_upload_bytes: cfg.max_upload_bytes,
            static_dir: cfg.storage.static_dir.clone(),
            report_locale: cfg.report_locale,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    counter: Arc<GuestCounter>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, counter: Arc<GuestCounter>) -> Self {
        Self { cfg, counter }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = Arc::new(self.cfg);
        let counter = self.counter;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, cfg, counter, shutdown_thread) {
                log::error!("guest counter api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: Arc<ApiConfig>,
    counter: Arc<GuestCounter>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let cfg = cfg.clone();
                let counter = counter.clone();
                // one worker per request so inference does not serialize accepts
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &counter, &cfg) {
                        log::warn!("request from {} failed: {}", peer, err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(20));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, counter: &GuestCounter, cfg: &ApiConfig) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(cfg.read_timeout))?;

    let response = match read_request(&mut stream, cfg.max_upload_bytes) {
        Ok(request) => route(&request, counter, cfg),
        Err(err) => {
            log::warn!("request rejected: {}", err);
            HttpResponse::error(&err)
        }
    };
    response.write_to(&mut stream)?;
    Ok(())
}

fn route(request: &HttpRequest, counter: &GuestCounter, cfg: &ApiConfig) -> HttpResponse {
    let path = request.path.as_str();
    let method = request.method.as_str();
    match (method, path) {
        ("POST", "/process-image") => process_image(request, counter),
        (_, "/process-image") => method_not_allowed(),
        ("GET", "/export/excel") => export_excel(counter, cfg.report_locale),
        ("GET", "/history") => history(counter),
        ("GET", "/health") => HttpResponse::json(200, json!({ "status": "ok" })),
        ("GET", "/") => serve_file(&cfg.static_dir, "index.html"),
        ("GET", _) if path.starts_with("/static/") => {
            serve_file(&cfg.static_dir, &path["/static/".len()..])
        }
        ("GET", _) if path.starts_with("/results/") => {
            serve_file(counter.results_dir(), &path["/results/".len()..])
        }
        (_, "/export/excel" | "/history" | "/health") => method_not_allowed(),
        _ => not_found(),
    }
}

fn process_image(request: &HttpRequest, counter: &GuestCounter) -> HttpResponse {
    let outcome = parse_process_form(request.header("content-type"), &request.body)
        .and_then(|form| counter.process_image(&form.file, &form.zone));
    match outcome {
        Ok(outcome) => HttpResponse::json(
            200,
            json!({
                "guests_count": outcome.guests_count,
                "result_image": outcome.result_image,
            }),
        ),
        Err(err) => failure("process-image", &err),
    }
}

fn export_excel(counter: &GuestCounter, locale: ReportLocale) -> HttpResponse {
    match counter.report(locale) {
        Ok(Some(bytes)) => HttpResponse::new(200, XLSX_CONTENT_TYPE, bytes).with_header(
            "Content-Disposition",
            format!("attachment; filename={REPORT_FILE_NAME}"),
        ),
        Ok(None) => HttpResponse::json(200, json!({ "error": EMPTY_HISTORY_MESSAGE })),
        Err(err) => failure("export/excel", &err),
    }
}

fn history(counter: &GuestCounter) -> HttpResponse {
    match counter.history() {
        Ok(log) => match serde_json::to_value(&log) {
            Ok(value) => HttpResponse::json(200, value),
            Err(err) => failure("history", &GuestCounterError::Io(std::io::Error::other(err))),
        },
        Err(err) => failure("history", &err),
    }
}

fn failure(route: &str, err: &GuestCounterError) -> HttpResponse {
    if err.status_code() >= 500 {
        log::error!("{} failed: {}", route, err);
    } else {
        log::warn!("{} rejected: {}", route, err);
    }
    HttpResponse::error(err)
}

fn method_not_allowed() -> HttpResponse {
    HttpResponse::json(405, json!({ "error": "method_not_allowed" }))
}

fn not_found() -> HttpResponse {
    HttpResponse::json(404, json!({ "error": "not_found" }))
}

/// Serve `relative` from `root`, refusing anything that escapes it.
fn serve_file(root: &Path, relative: &str) -> HttpResponse {
    let Some(path) = safe_join(root, relative) else {
        return not_found();
    };
    match std::fs::read(&path) {
        Ok(bytes) => HttpResponse::new(200, content_type_for(&path), bytes),
        Err(_) => not_found(),
    }
}

fn safe_join(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.is_empty() || relative.contains('\\') {
        return None;
    }
    let relative = Path::new(relative);
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn safe_join_rejects_traversal() {
        let root = Path::new("/srv/static");
        assert_eq!(
            safe_join(root, "css/app.css"),
            Some(PathBuf::from("/srv/static/css/app.css"))
        );
        assert_eq!(safe_join(root, "../history.json"), None);
        assert_eq!(safe_join(root, "a/../../b"), None);
        assert_eq!(safe_join(root, "/etc/passwd"), None);
        assert_eq!(safe_join(root, "..\\x"), None);
        assert_eq!(safe_join(root, ""), None);
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn unknown_routes_and_methods() {
        let dir = tempfile::tempdir().unwrap();
        let counter = GuestCounter::new(
            crate::detect::Detector::new(crate::detect::StubBackend::new()),
            Arc::new(crate::storage::InMemoryHistoryStore::new()),
            &crate::config::StorageSettings::under(dir.path()),
        );
        let cfg = ApiConfig::default();
        let request = |method: &str, path: &str| HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        };

        assert_eq!(route(&request("GET", "/nope"), &counter, &cfg).status, 404);
        assert_eq!(route(&request("GET", "/process-image"), &counter, &cfg).status, 405);
        assert_eq!(route(&request("DELETE", "/history"), &counter, &cfg).status, 405);
        assert_eq!(route(&request("GET", "/health"), &counter, &cfg).status, 200);
        assert_eq!(
            route(&request("GET", "/results/../history.json"), &counter, &cfg).status,
            404
        );
    }
}
