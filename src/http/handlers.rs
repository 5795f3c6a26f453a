use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::NewUser;
use crate::app::engagement::EngagementService;
use crate::app::feed::FeedService;
use crate::app::pagination::{Cursor, Page};
use crate::app::password_reset::ResetRequest;
use crate::app::posts::{NewPost, PostService, PostUpdate};
use crate::app::social::SocialService;
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::engagement::{Comment, Favorite, Like};
use crate::domain::post::Post;
use crate::domain::social_graph::Follow;
use crate::domain::user::{PublicUser, User, UserProfile};
use crate::domain::verification::VerificationCode;
use crate::http::extract::{JsonBody, PathParam, QueryParams};
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            next_cursor: page.next_cursor.map(|cursor| cursor.encode()),
        }
    }
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<Cursor>, AppError> {
    match cursor.filter(|cursor| !cursor.is_empty()) {
        Some(cursor) => Cursor::decode(&cursor)
            .map(Some)
            .ok_or_else(|| AppError::bad_request("invalid cursor")),
        None => Ok(None),
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
    pub user: PublicUser,
    pub message: &'static str,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }

    let (user, tokens) = state
        .auth_service()
        .login(&payload.email, &payload.password)
        .await?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        access: tokens.access_token,
        refresh: tokens.refresh_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
        user: user.into(),
        message: "login successful",
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Serialize)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    if payload.refresh.trim().is_empty() {
        return Err(AppError::bad_request("refresh is required"));
    }

    let tokens = state.auth_service().refresh(payload.refresh.trim()).await?;

    Ok(Json(TokenPairResponse {
        access: tokens.access_token,
        refresh: tokens.refresh_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
    }))
}

pub async fn logout(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh.trim().is_empty() {
        return Err(AppError::bad_request("refresh is required"));
    }

    state
        .auth_service()
        .logout(auth.user_id, payload.refresh.trim())
        .await?;

    tracing::info!(user_id = %auth.user_id, "user logged out");
    Ok(StatusCode::RESET_CONTENT)
}

#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub user: PublicUser,
    pub message: &'static str,
}

pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> Result<Json<SignupResponse>, AppError> {
    let user = state
        .auth_service()
        .signup(NewUser {
            email: payload.email,
            username: payload.username,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
        })
        .await?;

    tracing::info!(user_id = %user.id, "user signed up");
    Ok(Json(SignupResponse {
        user: user.into(),
        message: "user created successfully",
    }))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth_service()
        .change_password(
            auth.user_id,
            &payload.current_password,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;

    tracing::info!(user_id = %auth.user_id, "password changed");
    Ok(message("password changed successfully"))
}

#[derive(Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub email: String,
}

pub async fn send_code(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SendCodeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .password_reset_service()
        .send_code(&payload.email)
        .await?;

    Ok(message(
        "if an account exists for this email, a verification code has been sent",
    ))
}

#[derive(Deserialize)]
pub struct ValidateCodeRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Serialize)]
pub struct ValidateCodeResponse {
    #[serde(rename = "Validated")]
    pub validated: &'static str,
    #[serde(rename = "Entity")]
    pub entity: VerificationCode,
}

pub async fn validate_code(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ValidateCodeRequest>,
) -> Result<(StatusCode, Json<ValidateCodeResponse>), AppError> {
    let code = state
        .password_reset_service()
        .validate_code(&payload.code)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ValidateCodeResponse {
            validated: "code validated",
            entity: code,
        }),
    ))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .password_reset_service()
        .reset_password(ResetRequest {
            email: payload.email,
            code: payload.code,
            new_password: payload.new_password,
            confirm_password: payload.confirm_password,
        })
        .await?;

    Ok(message("password changed successfully"))
}

pub async fn get_profile_settings(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = UserService::new(state.db.clone())
        .get_user(auth.user_id)
        .await?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub profile_photo: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let user = UserService::new(state.db.clone())
        .update_profile(
            auth.user_id,
            ProfileUpdate {
                email: payload.email,
                username: payload.username,
                first_name: payload.first_name,
                last_name: payload.last_name,
                phone: payload.phone,
                street: payload.street,
                house_number: payload.house_number,
                profile_photo: payload.profile_photo,
            },
        )
        .await?;

    Ok(Json(user))
}

pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    UserService::new(state.db.clone())
        .delete_account(auth.user_id)
        .await?;

    tracing::info!(user_id = %auth.user_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct UserProfileResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
    pub posts: Vec<Post>,
    pub next_cursor: Option<String>,
}

pub async fn get_user_profile(
    PathParam(username): PathParam<String>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<UserProfileResponse>, AppError> {
    if username.trim().is_empty() {
        return Err(AppError::bad_request("username is required"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let user = UserService::new(state.db.clone())
        .get_by_username(&username)
        .await?;
    let social = SocialService::new(state.db.clone());
    let counts = social.counts(user.id).await?;
    let is_following = match auth {
        Some(auth) if auth.user_id != user.id => Some(social.is_following(auth.user_id, user.id).await?),
        _ => None,
    };
    let posts = ListResponse::from(
        PostService::new(state.db.clone())
            .list_by_author(user.id, cursor)
            .await?,
    );

    Ok(Json(UserProfileResponse {
        profile: UserProfile::from_user(user, counts.followers, counts.following, counts.posts),
        is_following,
        posts: posts.items,
        next_cursor: posts.next_cursor,
    }))
}

pub async fn list_user_posts(
    PathParam(id): PathParam<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let cursor = parse_cursor(query.cursor)?;
    let page = PostService::new(state.db.clone())
        .list_by_author(id, cursor)
        .await?;
    Ok(Json(page.into()))
}

#[derive(Deserialize)]
pub struct FollowRequest {
    pub followed: Option<Uuid>,
}

pub async fn follow_user(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<FollowRequest>,
) -> Result<(StatusCode, Json<Follow>), AppError> {
    let followed = payload
        .followed
        .ok_or_else(|| AppError::bad_request("followed is required"))?;

    let follow = SocialService::new(state.db.clone())
        .follow(auth.user_id, followed)
        .await?;

    tracing::info!(follower_id = %auth.user_id, followed_id = %followed, "user followed");
    Ok((StatusCode::CREATED, Json(follow)))
}

pub async fn unfollow_user(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<FollowRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let followed = payload
        .followed
        .ok_or_else(|| AppError::bad_request("followed is required"))?;

    SocialService::new(state.db.clone())
        .unfollow(auth.user_id, followed)
        .await?;

    Ok(message("unfollowed successfully"))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let post = PostService::new(state.db.clone())
        .create_post(
            auth.user_id,
            NewPost {
                content: payload.content,
                image: payload.image,
                tags: payload.tags,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    PathParam(id): PathParam<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Post>, AppError> {
    let post = PostService::new(state.db.clone()).get_post(id).await?;
    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub image: Option<String>,
}

pub async fn update_post(
    PathParam(id): PathParam<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    if payload.content.is_none() && payload.image.is_none() {
        return Err(AppError::bad_request("nothing to update"));
    }

    let post = PostService::new(state.db.clone())
        .update_post(
            id,
            auth.user_id,
            PostUpdate {
                content: payload.content,
                image: payload.image,
            },
        )
        .await?;
    Ok(Json(post))
}

pub async fn delete_post(
    PathParam(id): PathParam<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    PostService::new(state.db.clone())
        .delete_post(id, auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn home_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let cursor = parse_cursor(query.cursor)?;
    let page = FeedService::new(state.db.clone())
        .get_home_feed(auth.user_id, cursor)
        .await?;
    Ok(Json(page.into()))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

pub async fn create_comment(
    PathParam(post_id): PathParam<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = EngagementService::new(state.db.clone())
        .create_comment(auth.user_id, post_id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_post_comments(
    PathParam(post_id): PathParam<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<ListResponse<Comment>>, AppError> {
    let cursor = parse_cursor(query.cursor)?;
    let page = EngagementService::new(state.db.clone())
        .list_comments(post_id, cursor)
        .await?;
    Ok(Json(page.into()))
}

pub async fn update_comment(
    PathParam(id): PathParam<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let comment = EngagementService::new(state.db.clone())
        .update_comment(id, auth.user_id, &payload.content)
        .await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    PathParam(id): PathParam<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    EngagementService::new(state.db.clone())
        .delete_comment(id, auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub message: &'static str,
    pub like: Like,
}

pub async fn like_post(
    PathParam(post_id): PathParam<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<LikeResponse>), AppError> {
    let like = EngagementService::new(state.db.clone())
        .like_post(auth.user_id, post_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(LikeResponse {
            message: "post liked",
            like,
        }),
    ))
}

pub async fn unlike_post(
    PathParam(post_id): PathParam<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    EngagementService::new(state.db.clone())
        .unlike_post(auth.user_id, post_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct FavoritesQuery {
    pub post_id: Option<Uuid>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum FavoritesResponse {
    Status { is_favorited: bool },
    List(ListResponse<Post>),
}

/// With `post_id`, reports whether the caller favorited that post; otherwise lists favorites.
pub async fn get_favorites(
    auth: AuthUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<FavoritesQuery>,
) -> Result<Json<FavoritesResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    if let Some(post_id) = query.post_id {
        let is_favorited = service.is_favorited(auth.user_id, post_id).await?;
        return Ok(Json(FavoritesResponse::Status { is_favorited }));
    }

    let cursor = parse_cursor(query.cursor)?;
    let page = service.list_favorites(auth.user_id, cursor).await?;
    Ok(Json(FavoritesResponse::List(page.into())))
}

#[derive(Deserialize)]
pub struct FavoriteRequest {
    pub post_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct FavoriteResponse {
    pub message: &'static str,
    pub favorite: Favorite,
}

pub async fn favorite_post(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<FavoriteRequest>,
) -> Result<(StatusCode, Json<FavoriteResponse>), AppError> {
    let post_id = payload
        .post_id
        .ok_or_else(|| AppError::bad_request("post_id is required"))?;

    let favorite = EngagementService::new(state.db.clone())
        .favorite_post(auth.user_id, post_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(FavoriteResponse {
            message: "post favorited",
            favorite,
        }),
    ))
}

pub async fn unfavorite_post(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<FavoriteRequest>,
) -> Result<StatusCode, AppError> {
    let post_id = payload
        .post_id
        .ok_or_else(|| AppError::bad_request("post_id is required"))?;

    EngagementService::new(state.db.clone())
        .unfavorite_post(auth.user_id, post_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
