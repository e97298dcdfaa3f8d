use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{GroupRecord, GroupStore, PgStore};

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    /// 缺省时使用配置的默认半径
    pub radius_meters: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRadiusRequest {
    pub group_id: String,
    pub radius_meters: f64,
}

#[derive(Debug, Serialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: String,
    pub leader_id: String,
    pub radius_meters: f64,
    pub active: bool,
    pub member_count: i32,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl From<GroupRecord> for GroupInfo {
    fn from(group: GroupRecord) -> Self {
        Self {
            group_id: group.group_id,
            name: group.name,
            leader_id: group.leader_id,
            radius_meters: group.radius_meters,
            active: group.active,
            member_count: group.member_count,
        }
    }
}

impl GroupRecord {
    pub async fn create(
        pool: &PgPool,
        name: &str,
        leader_id: &str,
        radius_meters: f64,
    ) -> Result<Self, sqlx::Error> {
        let group_id = Uuid::new_v4().to_string();

        let group = sqlx::query_as::<_, GroupRecord>(
            r#"
            INSERT INTO groups (
                group_id, name, leader_id, radius_meters, active, created_at, member_count
            )
            VALUES ($1, $2, $3, $4, TRUE, NOW(), 1)
            RETURNING
                group_id, name, leader_id, radius_meters, active, created_at, member_count
            "#,
        )
        .bind(&group_id)
        .bind(name)
        .bind(leader_id)
        .bind(radius_meters)
        .fetch_one(pool)
        .await?;

        // 创建群组的同时把队长加入成员表
        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, joined_at, last_active)
            VALUES ($1, $2, NOW(), NOW())
            "#,
        )
        .bind(&group_id)
        .bind(leader_id)
        .execute(pool)
        .await?;

        Ok(group)
    }

    pub async fn join(store: &PgStore, group_id: &str, user_id: &str) -> Result<(), sqlx::Error> {
        let group = store
            .get_group(group_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if !group.active {
            return Err(sqlx::Error::Protocol("Group is not active".into()));
        }

        // 已经在群组中时直接成功
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM group_members
                WHERE group_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(store.pool())
        .await?;
        if exists {
            return Ok(());
        }

        // 开启事务：加成员和成员数必须一起生效
        let mut tx = store.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, joined_at, last_active)
            VALUES ($1, $2, NOW(), NOW())
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE groups
            SET member_count = member_count + 1
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // 成员数变了，清除相关缓存
        store.invalidate_group(group_id).await;

        Ok(())
    }

    pub async fn leave(store: &PgStore, group_id: &str, user_id: &str) -> Result<(), sqlx::Error> {
        let group = store
            .get_group(group_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        // 队长退出会让安全区失去参照，只能解散（停用）群组
        if group.leader_id == user_id {
            return Err(sqlx::Error::Protocol(
                "Leader cannot leave their own group".into(),
            ));
        }

        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM group_members
                WHERE group_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(store.pool())
        .await?;
        if !exists {
            return Err(sqlx::Error::Protocol("User not in group".into()));
        }

        let mut tx = store.pool().begin().await?;

        sqlx::query(
            r#"
            DELETE FROM group_members
            WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE groups
            SET member_count = member_count - 1
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        store.invalidate_group(group_id).await;

        Ok(())
    }

    /// 队长调整安全区半径；半径策略（上下限）由接口层先行收敛
    pub async fn update_radius(
        store: &PgStore,
        group_id: &str,
        user_id: &str,
        radius_meters: f64,
    ) -> Result<Self, sqlx::Error> {
        let group = store
            .get_group(group_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if group.leader_id != user_id {
            return Err(sqlx::Error::Protocol(
                "Only the leader can update the radius".into(),
            ));
        }

        let updated = sqlx::query_as::<_, GroupRecord>(
            r#"
            UPDATE groups
            SET radius_meters = $2
            WHERE group_id = $1
            RETURNING
                group_id, name, leader_id, radius_meters, active, created_at, member_count
            "#,
        )
        .bind(group_id)
        .bind(radius_meters)
        .fetch_one(store.pool())
        .await?;

        store.invalidate_group(group_id).await;

        Ok(updated)
    }

    /// 行程结束：停用群组，之后的位置样本只存档不评估
    pub async fn deactivate(
        store: &PgStore,
        group_id: &str,
        user_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let group = store
            .get_group(group_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if group.leader_id != user_id {
            return Err(sqlx::Error::Protocol(
                "Only the leader can deactivate the group".into(),
            ));
        }

        let updated = sqlx::query_as::<_, GroupRecord>(
            r#"
            UPDATE groups
            SET active = FALSE
            WHERE group_id = $1
            RETURNING
                group_id, name, leader_id, radius_meters, active, created_at, member_count
            "#,
        )
        .bind(group_id)
        .fetch_one(store.pool())
        .await?;

        store.invalidate_group(group_id).await;

        Ok(updated)
    }

    pub async fn members(pool: &PgPool, group_id: &str) -> Result<Vec<GroupMember>, sqlx::Error> {
        sqlx::query_as::<_, GroupMember>(
            r#"
            SELECT group_id, user_id, joined_at, last_active
            FROM group_members
            WHERE group_id = $1
            ORDER BY joined_at
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }
}
