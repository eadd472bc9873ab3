use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::artifacts::{self, InputDocument};
use crate::settings::{GeneratorSettings, SettingsError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no images found in {0}")]
    NoImages(PathBuf),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model API answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no content")]
    EmptyResponse,
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    High,
    Low,
}

/// One product screenshot to send with the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub path: PathBuf,
    pub detail: Detail,
}

impl ImageInput {
    fn mime(&self) -> &'static str {
        match extension(&self.path).as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => "image/png",
        }
    }

    fn data_url(&self) -> Result<String, GenerateError> {
        let bytes = fs::read(&self.path).map_err(|source| GenerateError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(format!("data:{};base64,{}", self.mime(), STANDARD.encode(bytes)))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Images in `dir`, full-page viewport shots first and sent at high detail.
pub fn collect_images(dir: &Path) -> Result<Vec<ImageInput>, GenerateError> {
    let io = |source| GenerateError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        let is_image = extension(&path).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()));
        if !path.is_file() || !is_image {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let detail = if name.contains("viewport") {
            Detail::High
        } else {
            Detail::Low
        };
        images.push(ImageInput { path, detail });
    }

    if images.is_empty() {
        return Err(GenerateError::NoImages(dir.to_path_buf()));
    }
    images.sort_by(|a, b| {
        (a.detail != Detail::High, &a.path).cmp(&(b.detail != Detail::High, &b.path))
    });
    Ok(images)
}

/// Produces one markdown document in the five-section template.
pub trait CopyGenerator {
    fn model(&self) -> &str;
    fn generate(&self, images: &[ImageInput]) -> Result<String, GenerateError>;
}

/// Copywriting instructions sent ahead of the images.
pub fn copy_prompt() -> Value {
    json!({
        "intro": "Eres un copywriter profesional especializado en páginas de producto de e-commerce con marketing de respuesta directa. Crea la página de ventas en formato listado siguiendo el orden de los metafields.",
        "style": {
            "audience": "adultos jóvenes y adultos",
            "tone": "playful, moderno, coleccionable",
            "bold_keywords": true,
            "language": "es"
        },
        "extraction_instructions": "Extrae de las imágenes nombre del producto, temática, número de piezas, funciones, escala y dimensiones (alto, ancho, longitud). Si un dato no se observa, escribe 'No observado en imágenes'.",
        "rules": [
            "Nunca mencionar la marca LEGO",
            "Usar palabras clave en negritas para destacar beneficios",
            "Evitar la palabra 'premium' salvo en 'manual impreso premium'",
            "Cada viñeta debe tener ~110 caracteres",
            "El título de la Sección 4 lleva signos de exclamación al inicio y al final",
            "Cada párrafo de la Sección 4 tiene 250–300 caracteres",
            "Sin CTA en la salida",
            "Usar exactamente los encabezados: ### 0. Nombre del Producto, ### 1. Viñetas, ### 2. FAQ, ### 3. Detalles Técnicos, ### 4. Video Section"
        ],
        "sections_order": {
            "0_nombre": "Nombre del producto con el número de piezas entre paréntesis, p. ej. 'Ramo de Flores (756 piezas)'",
            "1_vinetas": [
                "Beneficio funcional o emocional con número de piezas",
                "Dimensión destacada aplicada al valor de exhibición",
                "Detalle de diseño o realismo del modelo",
                "Experiencia de armado",
                "Regalo o valor coleccionable"
            ],
            "2_faq": {
                "¿Qué incluye el precio?": "El set completo con [número de piezas] piezas y manual impreso premium.",
                "¿Cuáles son las funciones y beneficios clave?": "Incluye [funciones principales] – todo diseñado para una experiencia realista y coleccionable.",
                "¿Por qué este set es especial?": "Porque combina diseño detallado, funciones realistas y una construcción sólida."
            },
            "3_detalles_tecnicos": {
                "ancho": "[valor en cm o 'No observado en imágenes']",
                "longitud": "[valor en cm o 'No observado en imágenes']",
                "alto": "[valor en cm o 'No observado en imágenes']",
                "piezas": "[número total de piezas]",
                "escala": "[valor o 'No observado en imágenes']"
            },
            "4_video_section": {
                "title": "¡[Heading de 4–7 palabras]!",
                "body": "Dos párrafos: experiencia de armado y dimensiones; funciones, valor de exhibición y colección.",
                "video": "[archivo de video si aplica]"
            }
        }
    })
}

/// Chat-completions client sending base64 screenshots.
pub struct OpenAiGenerator {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(settings: &GeneratorSettings) -> Result<Self, GenerateError> {
        let api_key = settings.api_key()?.to_string();
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
        })
    }
}

/// Request body: the prompt as text, then one `image_url` part per image.
pub fn request_body(model: &str, images: &[ImageInput]) -> Result<Value, GenerateError> {
    let prompt = serde_json::to_string_pretty(&copy_prompt()).unwrap_or_default();
    let mut content = vec![json!({
        "type": "text",
        "text": format!(
            "Analiza estas imágenes de producto siguiendo exactamente este prompt de copywriting: {}",
            prompt
        ),
    })];
    for image in images {
        content.push(json!({
            "type": "image_url",
            "image_url": { "url": image.data_url()?, "detail": image.detail },
        }));
    }
    Ok(json!({
        "model": model,
        "messages": [{ "role": "user", "content": content }],
        "max_tokens": MAX_TOKENS,
        "temperature": TEMPERATURE,
    }))
}

impl CopyGenerator for OpenAiGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, images: &[ImageInput]) -> Result<String, GenerateError> {
        let body = request_body(&self.model, images)?;
        debug!(images = images.len(), model = %self.model, "sending copy request");
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: ChatResponse = resp.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerateError::EmptyResponse)
    }
}

/// Generate copy for the screenshots in `images_dir` and write it as the
/// input document `push` reads.
pub fn run(generator: &dyn CopyGenerator, images_dir: &Path, out: &Path) -> Result<InputDocument> {
    let images = collect_images(images_dir)?;
    info!(count = images.len(), dir = %images_dir.display(), "collected images");

    let content = generator
        .generate(&images)
        .with_context(|| format!("generating copy with {}", generator.model()))?;
    let doc = InputDocument::markdown(content, generator.model());
    artifacts::write_json(out, &doc)?;
    info!(path = %out.display(), "wrote generated copy");
    Ok(doc)
}
