use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_nickname},
    state::{
        lobby::{Lobby, LobbyStatus},
        settings::GameSettings,
    },
};

/// Member entry inside a lobby projection.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LobbyMemberView {
    pub player_id: Uuid,
    pub nickname: String,
    pub is_ready: bool,
    pub is_owner: bool,
    pub joined_at: String,
}

/// Full lobby projection sent to its members.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LobbyView {
    pub id: Uuid,
    pub name: String,
    pub is_private: bool,
    /// Only present for members of a private lobby.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
    pub owner_id: Uuid,
    pub members: Vec<LobbyMemberView>,
    pub max_members: usize,
    pub settings: GameSettings,
    pub status: LobbyStatus,
    pub active_game_id: Option<Uuid>,
    pub created_at: String,
}

impl LobbyView {
    /// Project a lobby, exposing the join code only when `with_join_code` is set.
    pub fn from_lobby(lobby: &Lobby, with_join_code: bool) -> Self {
        let owner_id = lobby.owner_id();
        Self {
            id: lobby.id,
            name: lobby.name.clone(),
            is_private: lobby.is_private,
            join_code: lobby.join_code.clone().filter(|_| with_join_code),
            owner_id,
            members: lobby
                .members()
                .iter()
                .map(|(player_id, member)| LobbyMemberView {
                    player_id: *player_id,
                    nickname: member.nickname.clone(),
                    is_ready: member.is_ready,
                    is_owner: *player_id == owner_id,
                    joined_at: format_system_time(member.joined_at),
                })
                .collect(),
            max_members: lobby.max_members,
            settings: lobby.settings.clone(),
            status: lobby.status,
            active_game_id: lobby.active_game,
            created_at: format_system_time(lobby.created_at),
        }
    }
}

/// Entry of the public lobby browser.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LobbySummary {
    pub id: Uuid,
    pub name: String,
    pub owner_nickname: String,
    pub member_count: usize,
    pub max_members: usize,
    pub status: LobbyStatus,
    pub created_at: String,
}

impl From<&Lobby> for LobbySummary {
    fn from(lobby: &Lobby) -> Self {
        Self {
            id: lobby.id,
            name: lobby.name.clone(),
            owner_nickname: lobby
                .members()
                .get(&lobby.owner_id())
                .map(|member| member.nickname.clone())
                .unwrap_or_default(),
            member_count: lobby.members().len(),
            max_members: lobby.max_members,
            status: lobby.status,
            created_at: format_system_time(lobby.created_at),
        }
    }
}

/// Payload of the public lobby list and its SSE updates.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LobbyListResponse {
    pub lobbies: Vec<LobbySummary>,
}

/// Request body for checking whether a join would succeed.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinCheckRequest {
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
    #[serde(default)]
    pub join_code: Option<String>,
}

/// Outcome of a join pre-check.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinCheckResponse {
    pub lobby_id: Uuid,
    pub can_join: bool,
    /// Rejection reason when `can_join` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Request body for deleting a lobby.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteLobbyRequest {
    /// Player asking for the deletion; must own the lobby.
    pub player_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_lobby() -> Lobby {
        Lobby::new("Quiz night", Uuid::new_v4(), "alice", true, 4, GameSettings::default())
    }

    #[test]
    fn join_code_is_hidden_unless_requested() {
        let lobby = private_lobby();

        let public = LobbyView::from_lobby(&lobby, false);
        assert!(public.join_code.is_none());
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("join_code").is_none());

        let member = LobbyView::from_lobby(&lobby, true);
        assert_eq!(member.join_code, lobby.join_code);
    }

    #[test]
    fn view_flags_owner_and_keeps_join_order() {
        let mut lobby = private_lobby();
        let code = lobby.join_code.clone();
        let bob = Uuid::new_v4();
        lobby.join(bob, "bob", code.as_deref()).unwrap();

        let view = LobbyView::from_lobby(&lobby, true);
        assert_eq!(view.members.len(), 2);
        assert!(view.members[0].is_owner);
        assert_eq!(view.members[1].player_id, bob);
        assert!(!view.members[1].is_owner);
    }

    #[test]
    fn summary_names_owner() {
        let lobby = private_lobby();
        let summary = LobbySummary::from(&lobby);
        assert_eq!(summary.owner_nickname, "alice");
        assert_eq!(summary.member_count, 1);
    }

    #[test]
    fn join_check_request_validates_nickname() {
        let request: JoinCheckRequest =
            serde_json::from_str(r#"{ "nickname": "al" }"#).unwrap();
        assert!(request.validate().is_err());
    }
}
