use agora_common::{
    entities::{Poll, PollNetwork},
    messages::RESTResponse,
    rest_helper::json_or_not_found,
    store::EntityDb,
    EntityId,
};
use anyhow::Result;

/// Handles /polls/{network}/{id}
pub async fn handle_poll(db: EntityDb, params: Vec<String>) -> Result<RESTResponse> {
    let network = match params[0].as_str() {
        "mainnet" => PollNetwork::Mainnet,
        "arbitrum" => PollNetwork::Arbitrum,
        other => return Ok(RESTResponse::with_text(400, &format!("Invalid network {other}"))),
    };
    let id = EntityId::from(params[1].as_str());
    json_or_not_found(db.get_in::<Poll>(network, &id).await?, &format!("Poll {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_test_utils::memory_db;

    #[tokio::test]
    async fn unknown_network_is_rejected() {
        let params = vec!["optimism".to_string(), "10-1".to_string()];
        let response = handle_poll(memory_db(), params).await.unwrap();
        assert_eq!(response.code, 400);
    }

    #[tokio::test]
    async fn missing_poll_is_not_found() {
        let params = vec!["arbitrum".to_string(), "42161-1".to_string()];
        let response = handle_poll(memory_db(), params).await.unwrap();
        assert_eq!(response.code, 404);
    }
}
