use agora_common::{
    entities::{Delegate, Delegation, Urn},
    messages::RESTResponse,
    rest_helper::json_or_not_found,
    store::EntityDb,
    EntityId,
};
use anyhow::Result;

/// Handles /delegates/{id}
pub async fn handle_delegate(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let id = EntityId::from(params[0].as_str());
    json_or_not_found(db.get::<Delegate>(&id).await?, &format!("Delegate {id}"))
}

/// Handles /delegations/{id}
pub async fn handle_delegation(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let id = EntityId::from(params[0].as_str());
    json_or_not_found(db.get::<Delegation>(&id).await?, &format!("Delegation {id}"))
}

/// Handles /urns/{id}
pub async fn handle_urn(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let id = EntityId::from(params[0].as_str());
    json_or_not_found(db.get::<Urn>(&id).await?, &format!("Urn {id}"))
}
