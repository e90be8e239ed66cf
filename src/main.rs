mod bert;
mod llama;
mod vector_repository;

use std::{env, sync::Arc};

use anyhow::{Context, Error, Result};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing, Json, Router,
};
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{fs::File, io::AsyncWriteExt, sync::Mutex};

use crate::bert::Bert;
use crate::vector_repository::{VectorRepository, SAMPLE_MANIFESTS};

#[derive(Clone)]
struct AppState {
    bert: Arc<Mutex<Bert>>,
    vector_repo: Arc<VectorRepository>,
    model_path: String,
    prompt_template: String,
}

// See: https://github.com/tokio-rs/axum/blob/c979672/examples/anyhow-error-response/src/main.rs#L34-L57
struct AppError(Error);
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}
impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let model_dir = env::var("CHARTWRIGHT_MODEL_DIR").unwrap_or("/usr/src/models".to_string());
    let state = initialize(&model_dir).await?;
    println!("[INFO] main: state.model_path={}", &state.model_path);
    let app = Router::new()
        .route("/healthz", routing::get(|| async { "Ok" }))
        .route("/generate", routing::post(generate))
        .with_state(state);
    let port = env::var("CHARTWRIGHT_PORT").unwrap_or("3000".to_string());
    axum::Server::bind(&format!("0.0.0.0:{}", port).parse()?)
        .serve(app.into_make_service())
        .await
        .unwrap();
    Ok(())
}

async fn initialize(model_dir: &str) -> Result<AppState> {
    let mut bert = Bert::new()?;
    let mut vector_repo = VectorRepository::new(bert::EMBEDDING_DIMENSION);
    for manifest in SAMPLE_MANIFESTS {
        let embedding = bert.embed(manifest)?;
        vector_repo.add(embedding)?;
    }
    println!("[INFO] initialize: sample_manifests={}", vector_repo.len());
    let model_url = env::var("CHARTWRIGHT_MODEL_URL").unwrap_or(
        "https://huggingface.co/TheBloke/Mistral-7B-Instruct-v0.1-GGUF/resolve/main/mistral-7b-instruct-v0.1.Q5_K_M.gguf".to_string(),
    );
    let prompt_template = env::var("CHARTWRIGHT_PROMPT_TEMPLATE").unwrap_or("<s>[INST] {prompt} [/INST]".to_string());
    let model_name = model_url
        .split("/")
        .last()
        .context(format!("model_url={model_url}"))?
        .to_string();
    let model_path = format!("{model_dir}/{model_name}");
    let state = AppState {
        bert: Arc::new(Mutex::new(bert)),
        vector_repo: Arc::new(vector_repo),
        model_path,
        prompt_template,
    };
    if std::path::Path::new(&state.model_path).exists() {
        return Ok(state);
    }
    tokio::fs::create_dir_all(model_dir).await?;
    let mut file = File::create(&state.model_path).await?;
    let mut stream = reqwest::get(model_url).await?.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(state)
}

#[derive(Deserialize)]
struct GenerateRequest {
    name: Option<String>,
    repository: Option<String>,
    port: Option<Value>,
}

#[derive(Serialize)]
struct GenerateResponse {
    helm_chart: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Response, AppError> {
    let (name, repository, port) = match required_fields(&payload) {
        Some(fields) => fields,
        None => return Ok(missing_parameters_response().into_response()),
    };
    let prompt = build_prompt(&name, &repository, &port);
    let similar_manifest = {
        let mut bert = state.bert.lock().await;
        let embedding = bert.embed(&prompt)?;
        let position = state.vector_repo.search(&embedding)?;
        SAMPLE_MANIFESTS[position]
    };
    let completion = llama::generate(&state.model_path, &state.prompt_template, &prompt).await?;
    let response = GenerateResponse {
        helm_chart: compose_chart(similar_manifest, &completion),
    };
    Ok(Json(response).into_response())
}

fn missing_parameters_response() -> (StatusCode, Json<ErrorResponse>) {
    let response = ErrorResponse {
        error: "Missing required parameters".to_string(),
    };
    return (StatusCode::BAD_REQUEST, Json(response));
}

fn compose_chart(similar_manifest: &str, completion: &str) -> String {
    return format!("{}\n\n{}", similar_manifest, completion);
}

fn required_fields(payload: &GenerateRequest) -> Option<(String, String, String)> {
    let name = payload.name.as_deref()?.trim();
    let repository = payload.repository.as_deref()?.trim();
    // the port may arrive as either a JSON number or a string; zero is rejected
    let port = match payload.port.as_ref()? {
        Value::Number(port) if port.as_f64() != Some(0.0) => port.to_string(),
        Value::String(port) => port.trim().to_string(),
        _ => return None,
    };
    if name.is_empty() || repository.is_empty() || port.is_empty() {
        return None;
    }
    Some((name.to_string(), repository.to_string(), port))
}

fn build_prompt(name: &str, repository: &str, port: &str) -> String {
    return format!(
        "\
        Generate a complete Helm chart for a Kubernetes application named '{}'. \
        The Docker image should be pulled from '{}' and it should expose port '{}'. \
        The output should include:\n\
        - A Chart.yaml file\n\
        - A values.yaml file\n\
        - A templates/deployment.yaml file\n\
        - A templates/service.yaml file\n\
        Ensure that the chart is well-structured and includes all necessary configurations.",
        name, repository, port
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, repository: Option<&str>, port: Option<Value>) -> GenerateRequest {
        GenerateRequest {
            name: name.map(|name| name.to_string()),
            repository: repository.map(|repository| repository.to_string()),
            port,
        }
    }

    #[test]
    fn required_fields_accepts_numeric_port() {
        let payload = request(Some("app"), Some("registry.example.com/app"), Some(Value::from(8080)));
        let (name, repository, port) = required_fields(&payload).unwrap();
        assert_eq!(name, "app");
        assert_eq!(repository, "registry.example.com/app");
        assert_eq!(port, "8080");
    }

    #[test]
    fn required_fields_accepts_string_port() {
        let payload = request(Some("app"), Some("registry.example.com/app"), Some(Value::from("8080")));
        let (_name, _repository, port) = required_fields(&payload).unwrap();
        assert_eq!(port, "8080");
    }

    #[test]
    fn required_fields_rejects_port_zero() {
        assert!(required_fields(&request(Some("app"), Some("repo"), Some(Value::from(0)))).is_none());
        assert!(required_fields(&request(Some("app"), Some("repo"), Some(Value::from(0.0)))).is_none());
    }

    #[test]
    fn required_fields_rejects_missing_or_empty_values() {
        assert!(required_fields(&request(None, Some("repo"), Some(Value::from(80)))).is_none());
        assert!(required_fields(&request(Some("app"), None, Some(Value::from(80)))).is_none());
        assert!(required_fields(&request(Some("app"), Some("repo"), None)).is_none());
        assert!(required_fields(&request(Some(""), Some("repo"), Some(Value::from(80)))).is_none());
        assert!(required_fields(&request(Some("app"), Some("repo"), Some(Value::from("  ")))).is_none());
        assert!(required_fields(&request(Some("app"), Some("repo"), Some(Value::Bool(true)))).is_none());
    }

    #[test]
    fn missing_parameters_response_matches_the_wire_shape() {
        let (status, Json(body)) = missing_parameters_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"Missing required parameters"}"#
        );
    }

    #[test]
    fn chart_response_joins_manifest_and_completion_with_a_blank_line() {
        let response = GenerateResponse {
            helm_chart: compose_chart("kind: Service", "kind: Deployment"),
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"helm_chart":"kind: Service\n\nkind: Deployment"}"#
        );
    }

    #[test]
    fn prompt_names_every_chart_file() {
        let prompt = build_prompt("app", "registry.example.com/app", "8080");
        assert!(prompt.contains("named 'app'"));
        assert!(prompt.contains("pulled from 'registry.example.com/app'"));
        assert!(prompt.contains("expose port '8080'"));
        for file in [
            "Chart.yaml",
            "values.yaml",
            "templates/deployment.yaml",
            "templates/service.yaml",
        ] {
            assert!(prompt.contains(file));
        }
    }
}
