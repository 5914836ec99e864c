//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock の時刻をタイムスタンプ部に使う）

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ids::{ActorId, BoardId, ResourceId, RoleId, TaskId};
use crate::ports::Clock;

/// IdGenerator は ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（Engine と registry で共有する）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_board_id(&self) -> BoardId;

    fn generate_actor_id(&self) -> ActorId;

    fn generate_resource_id(&self) -> ResourceId;

    fn generate_role_id(&self) -> RoleId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// FixedClock を渡すとタイムスタンプ部が決定的になります（ランダム部は異なる）。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn generate_board_id(&self) -> BoardId {
        BoardId::from(self.next_ulid())
    }

    fn generate_actor_id(&self) -> ActorId {
        ActorId::from(self.next_ulid())
    }

    fn generate_resource_id(&self) -> ResourceId {
        ResourceId::from(self.next_ulid())
    }

    fn generate_role_id(&self) -> RoleId {
        RoleId::from(self.next_ulid())
    }
}
