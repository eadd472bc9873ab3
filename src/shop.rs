use std::time::Duration;

use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::settings::{SettingsError, ShopSettings};
use crate::reconcile::WriteOperation;
use crate::schema::{FieldSpec, NAMESPACE};

const METAFIELDS_PAGE: usize = 250;

const PRODUCT_METAFIELDS_QUERY: &str = r#"
query ProductMetafields($id: ID!, $first: Int!) {
  product(id: $id) {
    title
    metafields(first: $first) {
      edges { node { id namespace key type value } }
    }
  }
}"#;

const PRODUCT_TITLE_QUERY: &str = r#"
query ProductTitle($id: ID!) {
  product(id: $id) { title }
}"#;

const METAFIELDS_SET_MUTATION: &str = r#"
mutation MetafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields { id namespace key }
    userErrors { field message code }
  }
}"#;

const DEFINITION_CREATE_MUTATION: &str = r#"
mutation DefinitionCreate($definition: MetafieldDefinitionInput!) {
  metafieldDefinitionCreate(definition: $definition) {
    createdDefinition { id key }
    userErrors { field message code }
  }
}"#;

const PRODUCT_UPDATE_MUTATION: &str = r#"
mutation ProductUpdate($input: ProductInput!) {
  productUpdate(input: $input) {
    product { id title }
    userErrors { field message }
  }
}"#;

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("shop answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("graphql errors: {0}")]
    GraphQl(String),
    #[error("rejected by shop: {0}")]
    UserErrors(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("product {0} not found")]
    ProductNotFound(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Metafield as returned by the Admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetafield {
    pub id: String,
    pub namespace: String,
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Metafield echoed back by a successful `metafieldsSet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMetafield {
    pub id: String,
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl UserError {
    fn describe(&self) -> String {
        match &self.field {
            Some(path) if !path.is_empty() => format!("{}: {}", path.join("."), self.message),
            _ => self.message.clone(),
        }
    }

    fn is_taken(&self) -> bool {
        self.code.as_deref() == Some("TAKEN")
            || self.message.to_lowercase().contains("already")
    }
}

fn user_errors(errors: &[UserError]) -> ShopError {
    ShopError::UserErrors(errors.iter().map(UserError::describe).join("; "))
}

/// Outcome of creating metafield definitions.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DefinitionReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Product metafield storage. Implemented over HTTP by [`ShopClient`].
pub trait MetafieldStore {
    fn fetch_metafields(&self, product_id: &str) -> Result<Vec<RemoteMetafield>, ShopError>;

    /// Write one batch. Any user error fails the whole batch.
    fn set_metafields(
        &self,
        product_id: &str,
        batch: &[WriteOperation],
    ) -> Result<Vec<SavedMetafield>, ShopError>;

    fn product_title(&self, product_id: &str) -> Result<String, ShopError>;

    fn update_title(&self, product_id: &str, title: &str) -> Result<(), ShopError>;

    fn ensure_definitions(&self, specs: &[FieldSpec]) -> Result<DefinitionReport, ShopError>;
}

/// `123` → `gid://shopify/Product/123`; gids pass through.
pub fn product_gid(product_id: &str) -> String {
    let id = product_id.trim();
    if id.starts_with("gid://") {
        id.to_string()
    } else {
        format!("gid://shopify/Product/{}", id)
    }
}

pub fn metafield_gid(metafield_id: &str) -> String {
    let id = metafield_id.trim();
    if id.starts_with("gid://") {
        id.to_string()
    } else {
        format!("gid://shopify/Metafield/{}", id)
    }
}

/// `MetafieldsSetInput` for one write.
pub fn set_input(owner_id: &str, op: &WriteOperation) -> Value {
    json!({
        "ownerId": owner_id,
        "namespace": NAMESPACE,
        "key": op.key(),
        "type": op.kind().remote_type(),
        "value": op.value(),
    })
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Edges<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct ProductData<P> {
    product: Option<P>,
}

#[derive(Debug, Deserialize)]
struct ProductMetafields {
    metafields: Edges<RemoteMetafield>,
}

#[derive(Debug, Deserialize)]
struct ProductTitle {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetData {
    metafields_set: SetPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetPayload {
    #[serde(default)]
    metafields: Option<Vec<SavedMetafield>>,
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionData {
    metafield_definition_create: UserErrorPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductUpdateData {
    product_update: UserErrorPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserErrorPayload {
    user_errors: Vec<UserError>,
}

/// Admin GraphQL client for one shop.
pub struct ShopClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
    shop: String,
}

impl ShopClient {
    pub fn new(settings: &ShopSettings) -> Result<Self, ShopError> {
        let creds = settings.credentials()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "https://{}/admin/api/{}/graphql.json",
                creds.domain, settings.api_version
            ),
            token: creds.token,
            shop: creds.domain,
        })
    }

    pub fn shop(&self) -> &str {
        &self.shop
    }

    fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, ShopError> {
        debug!(endpoint = %self.endpoint, "graphql request");
        let resp = self
            .http
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", &self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()?;

        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(ShopError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GraphQlResponse<T> =
            serde_json::from_str(&body).map_err(|e| ShopError::Decode(e.to_string()))?;
        if !parsed.errors.is_empty() {
            return Err(ShopError::GraphQl(
                parsed.errors.iter().map(|e| e.message.as_str()).join("; "),
            ));
        }
        parsed
            .data
            .ok_or_else(|| ShopError::Decode("response has no data".into()))
    }
}

impl MetafieldStore for ShopClient {
    fn fetch_metafields(&self, product_id: &str) -> Result<Vec<RemoteMetafield>, ShopError> {
        let gid = product_gid(product_id);
        let data: ProductData<ProductMetafields> = self.graphql(
            PRODUCT_METAFIELDS_QUERY,
            json!({ "id": gid, "first": METAFIELDS_PAGE }),
        )?;
        let product = data.product.ok_or(ShopError::ProductNotFound(gid))?;
        let metafields: Vec<RemoteMetafield> =
            product.metafields.edges.into_iter().map(|e| e.node).collect();
        if metafields.len() == METAFIELDS_PAGE {
            warn!(count = METAFIELDS_PAGE, "metafield page full; later metafields not fetched");
        }
        info!(product = product_id, count = metafields.len(), "fetched metafields");
        Ok(metafields)
    }

    fn set_metafields(
        &self,
        product_id: &str,
        batch: &[WriteOperation],
    ) -> Result<Vec<SavedMetafield>, ShopError> {
        let owner = product_gid(product_id);
        let inputs: Vec<Value> = batch.iter().map(|op| set_input(&owner, op)).collect();
        let data: SetData =
            self.graphql(METAFIELDS_SET_MUTATION, json!({ "metafields": inputs }))?;

        let payload = data.metafields_set;
        if !payload.user_errors.is_empty() {
            return Err(user_errors(&payload.user_errors));
        }
        Ok(payload.metafields.unwrap_or_default())
    }

    fn product_title(&self, product_id: &str) -> Result<String, ShopError> {
        let gid = product_gid(product_id);
        let data: ProductData<ProductTitle> =
            self.graphql(PRODUCT_TITLE_QUERY, json!({ "id": gid }))?;
        data.product
            .map(|p| p.title)
            .ok_or(ShopError::ProductNotFound(gid))
    }

    fn update_title(&self, product_id: &str, title: &str) -> Result<(), ShopError> {
        let data: ProductUpdateData = self.graphql(
            PRODUCT_UPDATE_MUTATION,
            json!({ "input": { "id": product_gid(product_id), "title": title } }),
        )?;
        let errors = data.product_update.user_errors;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(user_errors(&errors))
        }
    }

    fn ensure_definitions(&self, specs: &[FieldSpec]) -> Result<DefinitionReport, ShopError> {
        let mut report = DefinitionReport::default();
        for spec in specs {
            let definition = json!({
                "name": spec.name,
                "namespace": NAMESPACE,
                "key": spec.key,
                "type": spec.kind.remote_type(),
                "ownerType": "PRODUCT",
            });
            let data: DefinitionData = self.graphql(
                DEFINITION_CREATE_MUTATION,
                json!({ "definition": definition }),
            )?;
            let errors = data.metafield_definition_create.user_errors;
            if errors.is_empty() {
                report.created.push(spec.key.to_string());
            } else if errors.iter().all(UserError::is_taken) {
                report.existing.push(spec.key.to_string());
            } else {
                let message = errors.iter().map(UserError::describe).join("; ");
                warn!(key = spec.key, %message, "definition not created");
                report.failed.push((spec.key.to_string(), message));
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValueKind;

    #[test]
    fn gids() {
        assert_eq!(product_gid(" 8421 "), "gid://shopify/Product/8421");
        assert_eq!(product_gid("gid://shopify/Product/1"), "gid://shopify/Product/1");
        assert_eq!(metafield_gid("55"), "gid://shopify/Metafield/55");
    }

    #[test]
    fn set_input_shape() {
        let op = WriteOperation::Update {
            remote_id: "gid://shopify/Metafield/3".into(),
            key: "alto".into(),
            kind: ValueKind::Decimal,
            value: "33.5".into(),
        };
        assert_eq!(
            set_input("gid://shopify/Product/1", &op),
            json!({
                "ownerId": "gid://shopify/Product/1",
                "namespace": "custom",
                "key": "alto",
                "type": "number_decimal",
                "value": "33.5",
            })
        );
    }

    #[test]
    fn decodes_metafields_response() {
        let body = r#"{"data":{"product":{"title":"Ramo","metafields":{"edges":[
            {"node":{"id":"gid://shopify/Metafield/1","namespace":"custom","key":"piezas","type":"number_integer","value":"756"}}
        ]}}}}"#;
        let parsed: GraphQlResponse<ProductData<ProductMetafields>> =
            serde_json::from_str(body).unwrap();
        let product = parsed.data.unwrap().product.unwrap();
        assert_eq!(product.metafields.edges[0].node.kind, "number_integer");
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn user_errors_joined() {
        let body = r#"{"metafieldsSet":{"metafields":null,"userErrors":[
            {"field":["metafields","0","value"],"message":"is invalid","code":"INVALID_VALUE"},
            {"field":null,"message":"boom","code":null}
        ]}}"#;
        let data: SetData = serde_json::from_str(body).unwrap();
        let err = user_errors(&data.metafields_set.user_errors);
        assert_eq!(err.to_string(), "rejected by shop: metafields.0.value: is invalid; boom");
    }

    #[test]
    fn taken_definitions() {
        let taken = UserError {
            field: None,
            message: "Key is in use".into(),
            code: Some("TAKEN".into()),
        };
        assert!(taken.is_taken());
    }
}
