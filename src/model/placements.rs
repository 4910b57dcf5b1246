// src/model/placements.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AdError;

/// 广告展示类型：弹窗或固定淡入淡出
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Popup,
    PinnedFade,
}

/// 投放平台，拉取广告列表时用于过滤
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    Web,
    Mobile,
    #[default]
    Both,
}

/// 广告位置：五个屏幕锚点 + 页面内嵌槽位
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
    HomeBelowHeader,
    HomeLatestAboveJobs,
    JobsBelowSearch,
    JobsEveryTwoRows,
    JobsBelowBrowse,
}

impl Position {
    pub const ALL: [Position; 10] = [
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
        Position::Center,
        Position::HomeBelowHeader,
        Position::HomeLatestAboveJobs,
        Position::JobsBelowSearch,
        Position::JobsEveryTwoRows,
        Position::JobsBelowBrowse,
    ];

    /// 固定在屏幕上的锚点位置（非页面内嵌槽位）
    pub fn is_fixed_anchor(self) -> bool {
        matches!(
            self,
            Position::TopLeft
                | Position::TopRight
                | Position::BottomLeft
                | Position::BottomRight
                | Position::Center
        )
    }

    /// 锚点对应的样式类；内嵌槽位按右下角处理
    pub fn anchor_class(self) -> &'static str {
        match self {
            Position::TopLeft => "pos-top-left",
            Position::TopRight => "pos-top-right",
            Position::BottomLeft => "pos-bottom-left",
            Position::Center => "pos-center",
            _ => "pos-bottom-right",
        }
    }

    /// 弹窗滑入方向
    pub fn popup_slide_class(self) -> &'static str {
        match self {
            Position::TopLeft | Position::BottomLeft => "popup-slide-from-left",
            Position::Center => "popup-slide-from-bottom",
            _ => "popup-slide-from-right",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Position::TopLeft => "TopLeft",
            Position::TopRight => "TopRight",
            Position::BottomLeft => "BottomLeft",
            Position::BottomRight => "BottomRight",
            Position::Center => "Center",
            Position::HomeBelowHeader => "HomeBelowHeader",
            Position::HomeLatestAboveJobs => "HomeLatestAboveJobs",
            Position::JobsBelowSearch => "JobsBelowSearch",
            Position::JobsEveryTwoRows => "JobsEveryTwoRows",
            Position::JobsBelowBrowse => "JobsBelowBrowse",
        }
    }
}

impl Placement {
    pub fn as_str(self) -> &'static str {
        match self {
            Placement::Popup => "Popup",
            Placement::PinnedFade => "PinnedFade",
        }
    }
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Web => "Web",
            Platform::Mobile => "Mobile",
            Platform::Both => "Both",
        }
    }

    /// 广告投放平台是否覆盖请求的平台
    pub fn serves(self, requested: Platform) -> bool {
        self == Platform::Both || requested == Platform::Both || self == requested
    }
}

impl FromStr for Position {
    type Err = AdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| AdError::InvalidField {
                field: "position",
                value: value.to_string(),
            })
    }
}

impl FromStr for Placement {
    type Err = AdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("Popup") => Ok(Placement::Popup),
            v if v.eq_ignore_ascii_case("PinnedFade") => Ok(Placement::PinnedFade),
            _ => Err(AdError::InvalidField {
                field: "placement",
                value: value.to_string(),
            }),
        }
    }
}

impl FromStr for Platform {
    type Err = AdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("Web") => Ok(Platform::Web),
            v if v.eq_ignore_ascii_case("Mobile") => Ok(Platform::Mobile),
            v if v.eq_ignore_ascii_case("Both") => Ok(Platform::Both),
            _ => Err(AdError::InvalidField {
                field: "platform",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
