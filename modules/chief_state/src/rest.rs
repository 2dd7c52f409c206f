use agora_common::{
    entities::{Slate, Spell, Voter},
    messages::RESTResponse,
    rest_helper::json_or_not_found,
    store::EntityDb,
    EntityId, Regime,
};
use anyhow::Result;

/// Handles /voters/{id}
pub async fn handle_voter(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let id = EntityId::from(params[0].as_str());
    json_or_not_found(db.get::<Voter>(&id).await?, &format!("Voter {id}"))
}

/// Handles /spells/{regime}/{id}
pub async fn handle_spell(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let Ok(regime) = params[0].parse::<Regime>() else {
        return Ok(RESTResponse::with_text(400, &format!("Invalid regime {}", params[0])));
    };
    let id = EntityId::from(params[1].as_str());
    json_or_not_found(db.get_in::<Spell>(regime, &id).await?, &format!("Spell {id}"))
}

/// Handles /slates/{regime}/{id}
pub async fn handle_slate(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let Ok(regime) = params[0].parse::<Regime>() else {
        return Ok(RESTResponse::with_text(400, &format!("Invalid regime {}", params[0])));
    };
    let id = EntityId::from(params[1].as_str());
    json_or_not_found(db.get_in::<Slate>(regime, &id).await?, &format!("Slate {id}"))
}
