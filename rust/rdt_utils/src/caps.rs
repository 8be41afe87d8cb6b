// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Backend Models
//!
//! Plain serde mirrors of the JSON the resource-allocation backend returns.
//! Fields the backend may omit are `Option`s and are left out again when
//! serialized.

use serde::Deserialize;
use serde::Serialize;

/// Capability names reported by `GET /caps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    L3cat,
    L2cat,
    Mba,
    Sstbf,
    Power,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::L3cat => "l3cat",
            Capability::L2cat => "l2cat",
            Capability::Mba => "mba",
            Capability::Sstbf => "sstbf",
            Capability::Power => "power",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caps {
    pub capabilities: Vec<String>,
}

impl Caps {
    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.iter().any(|c| c == cap.as_str())
    }
}

fn bytes_to_mib(bytes: u64) -> f64 {
    (bytes as f64 / 1024f64.powi(2) * 100.0).round() / 100.0
}

/// `GET /caps/l3cat` and `GET /caps/l2cat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheAllocation {
    pub cache_size: u64,
    pub cdp_enabled: bool,
    pub cdp_supported: bool,
    pub clos_num: u32,
    /// Number of cache ways, the width of every CBM.
    pub cw_num: usize,
    pub cw_size: u64,
}

impl CacheAllocation {
    /// Cache size in MiB rounded to two decimals.
    pub fn cache_size_mib(&self) -> f64 {
        bytes_to_mib(self.cache_size)
    }

    /// Cache way size in MiB rounded to two decimals.
    pub fn cw_size_mib(&self) -> f64 {
        bytes_to_mib(self.cw_size)
    }
}

/// `GET /caps/mba`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mba {
    pub clos_num: u32,
    pub mba_enabled: bool,
    pub mba_bw_enabled: bool,
}

/// `GET /caps/mba_ctrl`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MbaCtrl {
    pub enabled: bool,
    pub supported: bool,
}

/// `GET /caps/rdt_iface`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdtIface {
    pub interface: String,
    pub interface_supported: Vec<String>,
}

/// `GET /caps/sstbf`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sstbf {
    pub configured: bool,
    pub hp_cores: Vec<usize>,
    pub std_cores: Vec<usize>,
}

/// One entry of `GET /pools`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: u64,
    pub name: String,
    pub cores: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l3cbm: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l3cbm_code: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l3cbm_data: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2cbm: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2cbm_code: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2cbm_data: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mba: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mba_bw: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_profile: Option<u64>,
}

/// One entry of `GET /apps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: u64,
    pub name: String,
    pub pids: Vec<usize>,
    pub pool_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<Vec<usize>>,
}

/// Reply to every mutating request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps() {
        let caps: Caps = serde_json::from_str(
            r#"{"capabilities": ["l3cat", "mba", "sstbf", "future"]}"#,
        )
        .unwrap();
        assert!(caps.has(Capability::L3cat));
        assert!(caps.has(Capability::Mba));
        assert!(!caps.has(Capability::L2cat));
    }

    #[test]
    fn test_cache_allocation_sizes() {
        let cat: CacheAllocation = serde_json::from_str(
            r#"{
                "cache_size": 44040192,
                "cdp_enabled": false,
                "cdp_supported": true,
                "clos_num": 15,
                "cw_num": 12,
                "cw_size": 3670016
            }"#,
        )
        .unwrap();
        assert_eq!(cat.cw_num, 12);
        assert_eq!(cat.cache_size_mib(), 42.0);
        assert_eq!(cat.cw_size_mib(), 3.5);

        let odd = CacheAllocation {
            cache_size: 1310720,
            ..Default::default()
        };
        assert_eq!(odd.cache_size_mib(), 1.25);
    }

    #[test]
    fn test_pool_sparse_fields() {
        let pool: Pool = serde_json::from_str(
            r#"{"id": 1, "name": "hp", "cores": [1, 2], "l3cbm_code": 2047, "l3cbm_data": 15}"#,
        )
        .unwrap();
        assert_eq!(pool.l3cbm, None);
        assert_eq!(pool.l3cbm_code, Some(2047));

        let json = serde_json::to_value(&pool).unwrap();
        assert!(json.get("l3cbm").is_none());
        assert!(json.get("mba").is_none());
        assert_eq!(json["l3cbm_data"], 15);
    }

    #[test]
    fn test_app() {
        let app: App =
            serde_json::from_str(r#"{"id": 3, "name": "db", "pids": [100, 101], "pool_id": 1}"#)
                .unwrap();
        assert_eq!(app.cores, None);
        assert_eq!(app.pids, vec![100, 101]);
    }
}
