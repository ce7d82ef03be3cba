//! Route handlers.

use crate::{common::*, context::AppState, error::ApiError};
use axum::{body::Bytes, extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine};

pub const WELCOME_MESSAGE: &str = "Welcome to the Food Allergen Detection API";

/// The label served when no class confidence reaches the detection
/// threshold.
pub const NO_DETECTION_LABEL: &str = "Food allergens not detected";
const NO_DETECTION_FIELD: &str = "0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// A base64-encoded image, optionally wrapped in a data URL.
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: String,
    pub allergen: String,
    pub description: String,
    /// Per-class confidences as `[label, "xx.xx%"]` pairs in class index
    /// order.
    pub confidence: Vec<(String, String)>,
}

pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_owned(),
    })
}

pub async fn predict(
    State(context): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let request: PredictRequest = serde_json::from_slice(&body)
        .context("the request body is not a valid prediction request")?;

    let bytes = decode_base64_image(&request.image)?;
    let batch = context.loader().preprocess(&bytes)?;

    // inference takes the context mutex off the async runtime; after a
    // timeout the blocking task is left to finish on its own
    let prediction = {
        let context = context.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<Prediction> {
            let classifier = context.classifier().blocking_lock();
            let batch = batch.to_device(classifier.device());
            let probabilities = classifier.predict(&batch);
            Prediction::from_probabilities(&probabilities.i((0, ..)), context.classes())
        });

        match tokio::time::timeout(context.inference_timeout(), task).await {
            Ok(joined) => joined.map_err(|_| ApiError::new("the inference task failed"))??,
            Err(_) => return Err(ApiError::new("inference timed out")),
        }
    };

    let confidence: Vec<(String, String)> = prediction
        .confidences
        .iter()
        .map(|entry| (entry.label.clone(), entry.formatted()))
        .collect();

    let response = if prediction.is_detection() {
        let record = context
            .allergens()
            .get(&prediction.label)
            .ok_or_else(|| format_err!("the class '{}' has no allergen record", prediction.label))?;
        PredictResponse {
            prediction: prediction.label,
            allergen: record.allergen.clone(),
            description: record.description.clone(),
            confidence,
        }
    } else {
        PredictResponse {
            prediction: NO_DETECTION_LABEL.to_owned(),
            allergen: NO_DETECTION_FIELD.to_owned(),
            description: NO_DETECTION_FIELD.to_owned(),
            confidence,
        }
    };

    Ok(Json(response))
}

/// Extracts the raw image bytes from a base64 payload. A `data:` URL is
/// stripped through its first comma, anything else is decoded as is.
fn decode_base64_image(field: &str) -> Result<Vec<u8>> {
    let field = field.trim();
    ensure!(!field.is_empty(), "the image field is empty");

    let encoded = match field.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => field,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("the image field is not valid base64 data")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_router, context::AppContext};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use image::{DynamicImage, ImageOutputFormat, RgbImage};
    use tower::ServiceExt;

    fn test_router() -> Result<Router> {
        let classes = ClassIndexMap::load_classes_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../data/classes.txt"
        ))?;
        let allergens = AllergenMap::open(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../data/class_allergen_map.json"
        ))?;
        let classifier = Classifier::new(classes.num_classes(), Device::Cpu)?;
        let loader = ImageLoader::new(64, None)?;

        let context = AppContext::from_parts(
            classifier,
            classes,
            allergens,
            loader,
            Duration::from_secs(30),
        )?;
        Ok(build_router(Arc::new(context)))
    }

    fn black_png_data_url() -> Result<String> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(128, 128));
        let mut bytes = vec![];
        image.write_to(&mut bytes, ImageOutputFormat::Png)?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)))
    }

    async fn post_predict(
        router: Router,
        payload: impl Into<Body>,
    ) -> Result<(StatusCode, serde_json::Value)> {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/predict")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(payload.into())?,
            )
            .await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value = serde_json::from_slice(&bytes)?;
        Ok((status, value))
    }

    #[test]
    fn data_urls_and_raw_base64_decode_to_the_same_bytes() -> Result<()> {
        let raw = STANDARD.encode(b"hello");
        let wrapped = format!("data:image/png;base64,{}", raw);

        ensure!(decode_base64_image(&raw)? == b"hello");
        ensure!(decode_base64_image(&wrapped)? == b"hello");
        ensure!(decode_base64_image(&format!(" {} ", wrapped))? == b"hello");
        Ok(())
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(decode_base64_image("not-valid-base64").is_err());
        assert!(decode_base64_image("").is_err());
        assert!(decode_base64_image("data:image/png;base64,???").is_err());
    }

    #[tokio::test]
    async fn welcome_route_returns_the_greeting() -> Result<()> {
        let router = test_router()?;
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;

        ensure!(response.status() == StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: WelcomeResponse = serde_json::from_slice(&bytes)?;
        ensure!(body.message == WELCOME_MESSAGE);
        Ok(())
    }

    #[tokio::test]
    async fn predict_route_reports_every_class_confidence() -> Result<()> {
        let router = test_router()?;
        let payload = serde_json::json!({ "image": black_png_data_url()? }).to_string();
        let (status, value) = post_predict(router, payload).await?;

        ensure!(status == StatusCode::OK);
        let body: PredictResponse = serde_json::from_value(value)?;
        ensure!(body.confidence.len() == 30);
        ensure!(!body.prediction.is_empty());

        let total: f64 = body
            .confidence
            .iter()
            .map(|(_, percent)| -> Result<f64> {
                let digits = percent
                    .strip_suffix('%')
                    .ok_or_else(|| format_err!("'{}' has no percent suffix", percent))?;
                Ok(digits.parse()?)
            })
            .sum::<Result<f64>>()?;
        ensure!((total - 100.0).abs() < 0.5, "confidences sum to {}", total);

        // an untrained model stays under the detection threshold only if the
        // sentinel fields agree
        if body.allergen == "0" {
            ensure!(body.prediction == NO_DETECTION_LABEL);
            ensure!(body.description == "0");
        }
        Ok(())
    }

    #[tokio::test]
    async fn predict_route_rejects_invalid_base64() -> Result<()> {
        let router = test_router()?;
        let payload = serde_json::json!({ "image": "not-valid-base64" }).to_string();
        let (status, value) = post_predict(router, payload).await?;

        ensure!(status == StatusCode::BAD_REQUEST);
        let message = value["error"].as_str().unwrap_or_default();
        ensure!(!message.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn predict_route_rejects_undecodable_image_data() -> Result<()> {
        let router = test_router()?;
        let payload =
            serde_json::json!({ "image": STANDARD.encode(b"not an image") }).to_string();
        let (status, value) = post_predict(router, payload).await?;

        ensure!(status == StatusCode::BAD_REQUEST);
        ensure!(value["error"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_request_bodies_are_rejected() -> Result<()> {
        let router = test_router()?;
        let (status, value) = post_predict(router, "{}".to_owned()).await?;

        ensure!(status == StatusCode::BAD_REQUEST);
        let message = value["error"].as_str().unwrap_or_default();
        ensure!(message.contains("image"));
        Ok(())
    }

    #[tokio::test]
    async fn non_utf8_request_bodies_get_the_error_envelope() -> Result<()> {
        let router = test_router()?;
        let (status, value) = post_predict(router, vec![0xffu8, 0xfe, 0x80]).await?;

        ensure!(status == StatusCode::BAD_REQUEST);
        let message = value["error"].as_str().unwrap_or_default();
        ensure!(!message.is_empty());
        Ok(())
    }
}
