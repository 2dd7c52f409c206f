use agora_common::{
    entities::{Reward, RewardSupplier},
    messages::RESTResponse,
    rest_helper::json_or_not_found,
    store::EntityDb,
    EntityId,
};
use anyhow::Result;

/// Handles /rewards/{id}
pub async fn handle_reward(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let id = EntityId::from(params[0].as_str());
    json_or_not_found(db.get::<Reward>(&id).await?, &format!("Reward {id}"))
}

/// Handles /reward-suppliers/{id}
pub async fn handle_supplier(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let id = EntityId::from(params[0].as_str());
    json_or_not_found(db.get::<RewardSupplier>(&id).await?, &format!("Reward supplier {id}"))
}
