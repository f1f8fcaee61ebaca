use serde::{Deserialize, Serialize};

/// Stored field names, for store queries.
pub mod fields {
    pub const STORE_ID: &str = "idTienda";
}

/// A physical store location run by the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storefront {
    #[serde(rename = "nombreTienda")]
    pub name: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "codigoPostal")]
    pub postcode: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    /// Business key chosen by the owner, distinct from the storage id.
    #[serde(rename = "idTienda")]
    pub store_id: String,
    #[serde(rename = "imagenUrl", default)]
    pub image_url: Option<String>,
}

impl Storefront {
    /// City and postcode on one line, e.g. "Guadalajara 44100".
    pub fn locality(&self) -> String {
        format!("{} {}", self.city, self.postcode)
    }
}

/// Editable storefront fields. The business key never changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorefrontPatch {
    #[serde(rename = "nombreTienda", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "ciudad", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "codigoPostal", default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(rename = "direccion", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "imagenUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl StorefrontPatch {
    pub fn is_empty(&self) -> bool {
        self.to_fields().is_empty()
    }

    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Apply onto a copy of `base`, for echoing the updated record.
    pub fn applied_to(&self, base: &Storefront) -> Storefront {
        let mut updated = base.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if let Some(city) = &self.city {
            updated.city = city.clone();
        }
        if let Some(postcode) = &self.postcode {
            updated.postcode = postcode.clone();
        }
        if let Some(address) = &self.address {
            updated.address = address.clone();
        }
        if let Some(phone) = &self.phone {
            updated.phone = phone.clone();
        }
        if let Some(image_url) = &self.image_url {
            updated.image_url = Some(image_url.clone());
        }
        updated
    }
}
