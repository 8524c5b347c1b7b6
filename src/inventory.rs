// Inventory collaborator: catalog items and the item create/update endpoints
// The booking workflow only needs CatalogItem; the client exists for the bulk-add and edit screens

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{build_http_client, ApiError, ClientError};
use crate::config::ClientConfig;

// Inventory entry as the server encodes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogItem {
    #[serde(rename = "ID")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    // Availability override; an unavailable item is treated as having no stock
    pub available: bool,
    #[serde(default)]
    pub hazard_voltage: bool,
    #[serde(default)]
    pub hazard_toxic: bool,
    #[serde(default)]
    pub hazard_lazer: bool,
    #[serde(default)]
    pub hazard_misc: bool,
}

impl CatalogItem {
    pub fn bookable_quantity(&self) -> u32 {
        if self.available {
            self.quantity
        } else {
            0
        }
    }

    pub fn is_hazardous(&self) -> bool {
        self.hazard_voltage || self.hazard_toxic || self.hazard_lazer || self.hazard_misc
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub quantity: u32,
}

impl NewItem {
    // Default row created by the bulk-add screen before the user edits it
    pub fn placeholder(n: usize) -> Self {
        let name = format!("New Item {}", n);
        Self {
            description: name.clone(),
            name,
            available: true,
            quantity: 1,
        }
    }
}

// Partial update; unset fields are left as they are on the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_voltage: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_toxic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_lazer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_misc: Option<bool>,
}

pub struct InventoryClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl InventoryClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = build_http_client(&config)?;
        Ok(Self { config, http })
    }

    pub async fn create_item(&self, item: &NewItem) -> Result<CatalogItem, ApiError> {
        let url = self.item_url("create")?;
        let created = self.post_item(url, item).await?;
        info!(item_id = created.id, name = %created.name, "inventory item created");
        Ok(created)
    }

    pub async fn update_item(&self, id: u64, update: &ItemUpdate) -> Result<CatalogItem, ApiError> {
        let url = self.item_url(&format!("{}/edit", id))?;
        let updated = self.post_item(url, update).await?;
        info!(item_id = updated.id, "inventory item updated");
        Ok(updated)
    }

    fn item_url(&self, suffix: &str) -> Result<reqwest::Url, ApiError> {
        let path = format!("{}/{}", self.config.item_path.trim_end_matches('/'), suffix);
        self.config
            .endpoint(&path)
            .map_err(|e| ApiError::ClientError(e.to_string()))
    }

    async fn post_item<T: Serialize + ?Sized>(
        &self,
        url: reqwest::Url,
        body: &T,
    ) -> Result<CatalogItem, ApiError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.timeout_ms))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.timeout_ms))?;

        decode_item_response(status, &bytes)
    }
}

pub fn decode_item_response(status: u16, body: &[u8]) -> Result<CatalogItem, ApiError> {
    if !(200..300).contains(&status) {
        let err = ApiError::from_status(status, body);
        warn!(status, error = %err, "inventory request failed");
        return Err(err);
    }

    serde_json::from_slice(body).map_err(|e| ApiError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM_JSON: &str = r#"{
        "ID": 7,
        "CreatedAt": "2024-01-15T09:00:00Z",
        "UpdatedAt": "2024-01-15T09:00:00Z",
        "DeletedAt": null,
        "Name": "30cm ruler",
        "Description": "Clear plastic ruler",
        "Quantity": 30,
        "Available": true,
        "HazardVoltage": false,
        "HazardToxic": false,
        "HazardLazer": false,
        "HazardMisc": false
    }"#;

    #[test]
    fn test_decode_created_item() {
        let item = decode_item_response(200, ITEM_JSON.as_bytes()).unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.name, "30cm ruler");
        assert_eq!(item.bookable_quantity(), 30);
        assert!(!item.is_hazardous());
    }

    #[test]
    fn test_decode_failure_body() {
        let body = br#"{"error":"Bad Body Syntax","message":"Malformed JSON: unexpected EOF"}"#;
        match decode_item_response(400, body) {
            Err(ApiError::Rejected { status_code, error, .. }) => {
                assert_eq!(status_code, 400);
                assert_eq!(error, "Bad Body Syntax");
            }
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_success_body() {
        let result = decode_item_response(200, b"<html>login</html>");
        assert!(matches!(result, Err(ApiError::MalformedResponse(_))));
    }

    #[test]
    fn test_unavailable_item_has_no_stock() {
        let mut item = decode_item_response(200, ITEM_JSON.as_bytes()).unwrap();
        item.available = false;
        assert_eq!(item.bookable_quantity(), 0);
    }

    #[test]
    fn test_new_item_payload() {
        let payload = serde_json::to_value(NewItem::placeholder(3)).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "name": "New Item 3",
                "description": "New Item 3",
                "available": true,
                "quantity": 1,
            })
        );
    }

    #[test]
    fn test_item_update_only_sends_set_fields() {
        let update = ItemUpdate {
            quantity: Some(12),
            hazard_lazer: Some(true),
            ..Default::default()
        };
        let payload = serde_json::to_value(&update).unwrap();
        assert_eq!(payload, serde_json::json!({"Quantity": 12, "HazardLazer": true}));
    }

    #[test]
    fn test_item_urls() {
        let client = InventoryClient::new(ClientConfig {
            base_url: "http://lab.example.org".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.item_url("create").unwrap().as_str(),
            "http://lab.example.org/api/item/create"
        );
        assert_eq!(
            client.item_url("7/edit").unwrap().as_str(),
            "http://lab.example.org/api/item/7/edit"
        );
    }
}
