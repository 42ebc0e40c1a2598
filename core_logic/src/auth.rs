use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::db::people;
use crate::error::{AuthError, CoreError, CoreResult};

// Домены e-mail для автоопределения типа пользователя
const STAFF_DOMAINS: &[&str] = &["@colegio.edu.bo", "@sistema.edu", "@admin.edu", "@docente.edu"];
const STUDENT_DOMAINS: &[&str] = &["@estudiante.edu.bo", "@student.edu", "@alumno.edu"];
const PARENT_DOMAINS: &[&str] = &["@padre.com", "@madre.com", "@family.com", "@padres.edu"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl UserType {
    pub fn is_staff(self) -> bool {
        matches!(self, UserType::Admin | UserType::Teacher)
    }
}

/// Таблица, в которой хранятся учётные данные.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Account {
    Staff,
    Student,
    Parent,
}

impl From<UserType> for Account {
    fn from(user_type: UserType) -> Self {
        match user_type {
            UserType::Admin | UserType::Teacher => Account::Staff,
            UserType::Student => Account::Student,
            UserType::Parent => Account::Parent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_type: UserType,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub user_type: Option<UserType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: i64,
    pub user_type: UserType,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_type: UserType,
    pub user_id: i64,
    pub profile: UserProfile,
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// Неверный формат хэша считается несовпадением.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

pub fn issue_token(
    user_type: UserType,
    user_id: i64,
    email: &str,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        user_type,
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(AuthError::Encoding)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Token rejected: {}", e);
            AuthError::InvalidToken
        })
}

/// Тип пользователя по домену e-mail (для сотрудников - Teacher).
pub fn detect_user_type(email: &str) -> Option<UserType> {
    let email = email.to_lowercase();
    let has = |domains: &[&str]| domains.iter().any(|d| email.ends_with(d));
    if has(STAFF_DOMAINS) {
        Some(UserType::Teacher)
    } else if has(STUDENT_DOMAINS) {
        Some(UserType::Student)
    } else if has(PARENT_DOMAINS) {
        Some(UserType::Parent)
    } else {
        None
    }
}

/// Проверяет учётные данные и возвращает тип и id пользователя.
pub async fn authenticate(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    requested: Option<UserType>,
) -> CoreResult<(UserType, i64)> {
    let order: Vec<Account> = match requested {
        Some(user_type) => vec![user_type.into()],
        None => {
            let mut order = Vec::with_capacity(3);
            if let Some(detected) = detect_user_type(email) {
                order.push(Account::from(detected));
            }
            for account in [Account::Staff, Account::Student, Account::Parent] {
                if !order.contains(&account) {
                    order.push(account);
                }
            }
            order
        }
    };

    for account in order {
        if let Some(found) = try_account(pool, account, email, password).await? {
            info!("User {} authenticated as {:?}", email, found.0);
            return Ok(found);
        }
    }
    Err(AuthError::InvalidCredentials.into())
}

async fn try_account(
    pool: &SqlitePool,
    account: Account,
    email: &str,
    password: &str,
) -> Result<Option<(UserType, i64)>, sqlx::Error> {
    let found = match account {
        Account::Staff => people::teacher_credentials(pool, email)
            .await?
            .filter(|(_, hash, _)| verify_password(password, hash))
            .map(|(id, _, is_teacher)| {
                let user_type = if is_teacher { UserType::Teacher } else { UserType::Admin };
                (user_type, id)
            }),
        // Студент или родитель без пароля войти не может
        Account::Student => people::student_credentials(pool, email)
            .await?
            .and_then(|(id, hash)| hash.map(|h| (id, h)))
            .filter(|(_, hash)| verify_password(password, hash))
            .map(|(id, _)| (UserType::Student, id)),
        Account::Parent => people::parent_credentials(pool, email)
            .await?
            .filter(|(_, hash)| verify_password(password, hash))
            .map(|(id, _)| (UserType::Parent, id)),
    };
    Ok(found)
}

pub async fn profile(pool: &SqlitePool, user_type: UserType, id: i64) -> CoreResult<UserProfile> {
    let profile = match user_type {
        UserType::Admin | UserType::Teacher => people::get_teacher(pool, id).await?.map(|t| UserProfile {
            id: t.id,
            user_type: if t.is_teacher { UserType::Teacher } else { UserType::Admin },
            first_name: t.first_name,
            last_name: t.last_name,
            email: Some(t.email),
            phone: Some(t.phone),
            image_url: None,
        }),
        UserType::Student => people::get_student(pool, id).await?.map(|s| UserProfile {
            id: s.id,
            user_type,
            first_name: s.first_name,
            last_name: s.last_name,
            email: s.email,
            phone: s.guardian_phone,
            image_url: s.image_url,
        }),
        UserType::Parent => people::get_parent(pool, id).await?.map(|p| UserProfile {
            id: p.id,
            user_type,
            first_name: p.first_name,
            last_name: p.last_name,
            email: Some(p.email),
            phone: Some(p.phone),
            image_url: None,
        }),
    };
    profile.ok_or_else(|| CoreError::not_found("User"))
}

/// Вход: проверка, выпуск токена и профиль.
pub async fn login(
    pool: &SqlitePool,
    req: &LoginRequest,
    secret: &str,
    ttl_hours: i64,
) -> CoreResult<TokenResponse> {
    let (user_type, user_id) = authenticate(pool, &req.email, &req.password, req.user_type).await?;
    let access_token = issue_token(user_type, user_id, &req.email, secret, ttl_hours)?;
    let profile = profile(pool, user_type, user_id).await?;
    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user_type,
        user_id,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn detects_type_by_domain() {
        assert_eq!(detect_user_type("ana@ESTUDIANTE.edu.bo"), Some(UserType::Student));
        assert_eq!(detect_user_type("prof@docente.edu"), Some(UserType::Teacher));
        assert_eq!(detect_user_type("mama@madre.com"), Some(UserType::Parent));
        assert_eq!(detect_user_type("someone@gmail.com"), None);
    }

    #[test]
    fn token_roundtrip_and_rejection() {
        let token = issue_token(UserType::Parent, 7, "p@padre.com", "secret", 1).unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.user_type, UserType::Parent);
        assert!(matches!(decode_token(&token, "other"), Err(AuthError::InvalidToken)));

        let expired = issue_token(UserType::Parent, 7, "p@padre.com", "secret", -2).unwrap();
        assert!(matches!(decode_token(&expired, "secret"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        let hash = hash_password("pw", 4).unwrap();
        assert!(verify_password("pw", &hash));
        assert!(!verify_password("nope", &hash));
        assert!(!verify_password("pw", "not-a-bcrypt-hash"));
    }

    #[tokio::test]
    async fn login_falls_back_across_tables() {
        let school = testing::school().await;
        let pool = &school.pool;

        // Администратор: строка teachers с is_teacher = false
        let (user_type, id) = authenticate(pool, testing::ADMIN_EMAIL, testing::PASSWORD, None).await.unwrap();
        assert_eq!((user_type, id), (UserType::Admin, school.admin_id));

        // Домен не распознан, но студент найден при переборе таблиц
        let (user_type, id) = authenticate(pool, testing::STUDENT_EMAIL, testing::PASSWORD, None).await.unwrap();
        assert_eq!((user_type, id), (UserType::Student, school.student_id));

        let err = authenticate(pool, testing::PARENT_EMAIL, "wrong", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        // Явно указанный тип ограничивает поиск одной таблицей
        let err = authenticate(pool, testing::PARENT_EMAIL, testing::PASSWORD, Some(UserType::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn student_without_password_cannot_log_in() {
        let school = testing::school().await;
        let err = authenticate(&school.pool, testing::SECOND_STUDENT_EMAIL, "", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_returns_profile() {
        let school = testing::school().await;
        let req = LoginRequest {
            email: testing::TEACHER_EMAIL.to_string(),
            password: testing::PASSWORD.to_string(),
            user_type: None,
        };
        let token = login(&school.pool, &req, "s", 24).await.unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.user_type, UserType::Teacher);
        assert_eq!(token.profile.first_name, "Carlos");
    }
}
