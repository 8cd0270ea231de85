// src/openrtb/request.rs

use serde::{Deserialize, Deserializer, Serialize};

/// 入站 OpenRTB BidRequest。
///
/// `site` / `app` / `device` / `user` 缺失时序列化为显式的 `null`，
/// 以保证写入 Kafka 的负载结构固定；补充字段（`imp`、`ua` 等）缺失时直接省略。
/// 解析之后只读，整个处理链路中不会被修改。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub site: Option<Site>,
    #[serde(default)]
    pub app: Option<App>,
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub user: Option<User>,

    /// 广告展示请求列表
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imp: Option<Vec<Impression>>,
}

/// 网站信息
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Site {
    #[serde(default, deserialize_with = "null_as_default")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// IAB 分类
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
}

/// 应用信息
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct App {
    /// 例如 com.rovio.angrybirds
    #[serde(default, deserialize_with = "null_as_default")]
    pub bundle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 设备信息
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Device {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub os: String,
    /// Limit Ad Tracking，0 或 1
    #[serde(default, deserialize_with = "null_as_default")]
    pub lmt: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,
    /// ID for Advertisers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifa: Option<String>,
}

impl Device {
    /// 用户是否开启了 "Limit Ad Tracking"
    pub fn limits_ad_tracking(&self) -> bool {
        self.lmt == 1
    }
}

/// 用户信息
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyeruid: Option<String>,
}

/// 单个广告展示请求
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Impression {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    /// 最低出价
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidfloor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidfloorcur: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Banner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Video {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i32>,
}

/// 上游偶尔会把标量字段写成 `null`，按零值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
