//! HTTP client for a remote model server.
//!
//! Speaks the TensorFlow-Serving REST predict API: `POST {url}` with
//! `{"instances": [...]}` where every instance is a `height x width x 3`
//! nested array, answered by `{"predictions": [[score, ...], ...]}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use xplain_core::capability::{Classifier, Scores};
use xplain_core::error::CoreError;
use xplain_core::image::ImageTensor;

/// Errors from the model server REST layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteClassifierError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The model server returned a non-2xx status code.
    #[error("Model server error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The response did not contain one prediction per instance.
    #[error("Expected {expected} predictions, got {actual}")]
    Shape { expected: usize, actual: usize },
}

impl From<RemoteClassifierError> for CoreError {
    fn from(err: RemoteClassifierError) -> Self {
        CoreError::Inference(err.to_string())
    }
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<Vec<Vec<[f32; 3]>>>,
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Scores>,
}

/// [`Classifier`] backed by a model server.
pub struct RemoteClassifier {
    client: reqwest::Client,
    predict_url: String,
}

impl RemoteClassifier {
    /// * `predict_url` - full predict endpoint, e.g.
    ///   `http://localhost:8501/v1/models/breeds:predict`.
    pub fn new(predict_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), predict_url)
    }

    pub fn with_client(client: reqwest::Client, predict_url: String) -> Self {
        Self {
            client,
            predict_url,
        }
    }

    async fn call(&self, batch: &[ImageTensor]) -> Result<Vec<Scores>, RemoteClassifierError> {
        let body = PredictRequest {
            instances: batch.iter().map(to_nested).collect(),
        };

        let response = self.client.post(&self.predict_url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
            return Err(RemoteClassifierError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse = response.json().await?;
        if parsed.predictions.len() != batch.len() {
            return Err(RemoteClassifierError::Shape {
                expected: batch.len(),
                actual: parsed.predictions.len(),
            });
        }
        Ok(parsed.predictions)
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn predict(&self, batch: &[ImageTensor]) -> Result<Vec<Scores>, CoreError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.call(batch).await?)
    }
}

fn to_nested(image: &ImageTensor) -> Vec<Vec<[f32; 3]>> {
    (0..image.height)
        .map(|y| (0..image.width).map(|x| image.pixel(x, y)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Echoes one prediction per instance: `[height, width, first red value]`.
    async fn echo_shape(Json(body): Json<Value>) -> Json<Value> {
        let predictions: Vec<Value> = body["instances"]
            .as_array()
            .unwrap()
            .iter()
            .map(|inst| {
                let rows = inst.as_array().unwrap();
                let cols = rows[0].as_array().unwrap();
                json!([rows.len(), cols.len(), cols[0][0]])
            })
            .collect();
        Json(json!({ "predictions": predictions }))
    }

    #[tokio::test]
    async fn sends_nested_instances_and_reads_predictions() {
        let base = serve(Router::new().route("/v1/models/m:predict", post(echo_shape))).await;
        let classifier = RemoteClassifier::new(format!("{base}/v1/models/m:predict"));

        let mut img = ImageTensor::zeros(3, 2);
        img.set_pixel(0, 0, [0.5, 0.0, 0.0]);

        let scores = classifier.predict(&[img.clone(), img]).await.unwrap();
        assert_eq!(scores, vec![vec![2.0, 3.0, 0.5], vec![2.0, 3.0, 0.5]]);
    }

    #[tokio::test]
    async fn server_error_maps_to_inference_error() {
        let router = Router::new().route(
            "/predict",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = serve(router).await;
        let classifier = RemoteClassifier::new(format!("{base}/predict"));

        let err = classifier.predict(&[ImageTensor::zeros(1, 1)]).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("503"), "unexpected error: {msg}");
        assert!(msg.contains("overloaded"));
    }

    #[tokio::test]
    async fn wrong_prediction_count_is_rejected() {
        let router = Router::new().route(
            "/predict",
            post(|| async { Json(json!({ "predictions": [] })) }),
        );
        let base = serve(router).await;
        let classifier = RemoteClassifier::new(format!("{base}/predict"));

        let err = classifier.predict(&[ImageTensor::zeros(1, 1)]).await.unwrap_err();
        assert!(err.to_string().contains("Expected 1 predictions, got 0"));
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() {
        let classifier = RemoteClassifier::new("http://127.0.0.1:1/unreachable".into());
        assert!(classifier.predict(&[]).await.unwrap().is_empty());
    }
}
