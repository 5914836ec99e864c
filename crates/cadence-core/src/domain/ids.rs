//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + Phantom type
//! すべての ID は ULID (Universally Unique Lexicographically Sortable Identifier) です。
//! `Id<T>` というジェネリック型で共通実装を提供し、`T` はマーカー型として
//! コンパイル時に TaskId と ActorId などの混同を防ぎます。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 生成順序でソートできる（`TaskGraph::get_all` の順序に使う）
//! - **分散生成可能**: 調整なしで生成できる
//! - **文字列表現**: スナップショットには 26 文字の ULID 文字列として保存される

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "actor-" など）を提供します。
///
/// `#[derive]` は `T` にも同じ trait を要求するので、`Id<T>` を
/// `BTreeMap` / `HashMap` のキーとしてジェネリックに使えるように
/// 比較・ハッシュ系の trait を supertrait にしています。
pub trait IdMarker:
    fmt::Debug + Copy + Eq + Ord + Hash + Send + Sync + 'static
{
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// シリアライズ時は ULID 文字列そのもの（プレフィックスなし）になります。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Task のマーカー型
    Task,
    "task-"
);
id_marker!(
    /// Board（タスクのグループ = 保存形式上の graph）のマーカー型
    Board,
    "board-"
);
id_marker!(
    /// Actor のマーカー型
    Actor,
    "actor-"
);
id_marker!(
    /// Resource のマーカー型
    Resource,
    "resource-"
);
id_marker!(
    /// Role のマーカー型
    Role,
    "role-"
);

// ========================================
// Type Alias
// ========================================

/// Identifier of a task node. Stable across save/load.
pub type TaskId = Id<Task>;

/// Identifier of a board. Stable across save/load.
pub type BoardId = Id<Board>;

/// Identifier of an actor. Regenerated on import, resolved through the remap table.
pub type ActorId = Id<Actor>;

/// Identifier of a resource. Regenerated on import, resolved through the remap table.
pub type ResourceId = Id<Resource>;

/// Identifier of a role. Regenerated on import, resolved through the remap table.
pub type RoleId = Id<Role>;
