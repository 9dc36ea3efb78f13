use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateUserReq {
    #[schema(example = "dr.sari")]
    pub username: String,
    #[schema(example = "correct horse battery staple")]
    pub password: String,
    /// 1 admin, 2 management, 3 staff, 4 doctor, 5 paramedic, 6 treasury
    #[schema(example = 4)]
    pub role_id: u8,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "dr.sari")]
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,
}
