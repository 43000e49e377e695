//! Static achievement catalog.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Transaction,
    Holding,
    Security,
    Referral,
    Loyalty,
    Education,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transaction => "transaction",
            Category::Holding => "holding",
            Category::Security => "security",
            Category::Referral => "referral",
            Category::Loyalty => "loyalty",
            Category::Education => "education",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }
}

/// How progress towards an achievement is measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// Any recorded transactions.
    Transactions(u32),
    /// Transactions with status `completed`.
    CompletedTransactions(u32),
    /// Distinct assets with a positive balance.
    AssetsHeld(u32),
    /// Days since the oldest receive of an asset still held.
    HoldDays(u32),
    /// Portfolio value in USD.
    PortfolioValue(f64),
    /// Account created within this many days of the launch date.
    RegisteredWithinDays(u32),
    /// Set through the API.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: Category,
    pub tier: Tier,
    pub points: u32,
    /// Numeric goal shown to clients (count, days or USD).
    pub target: u32,
    #[serde(skip)]
    pub rule: Rule,
}

pub const CATALOG: &[Achievement] = &[
    Achievement {
        id: "first-transaction",
        title: "First Transaction",
        description: "Made your first transaction in the wallet",
        icon: "Rocket",
        category: Category::Transaction,
        tier: Tier::Bronze,
        points: 10,
        target: 1,
        rule: Rule::Transactions(1),
    },
    Achievement {
        id: "wallet-diversifier",
        title: "Diversified Investor",
        description: "Hold 5 different cryptocurrencies",
        icon: "Layers",
        category: Category::Holding,
        tier: Tier::Silver,
        points: 20,
        target: 5,
        rule: Rule::AssetsHeld(5),
    },
    Achievement {
        id: "hodler",
        title: "Patient Investor",
        description: "Hold a coin for 30 consecutive days",
        icon: "Clock",
        category: Category::Holding,
        tier: Tier::Silver,
        points: 30,
        target: 30,
        rule: Rule::HoldDays(30),
    },
    Achievement {
        id: "security-master",
        title: "Security Expert",
        description: "Enable every security feature of the wallet",
        icon: "Shield",
        category: Category::Security,
        tier: Tier::Gold,
        points: 40,
        target: 3,
        rule: Rule::Manual,
    },
    Achievement {
        id: "whale",
        title: "Whale",
        description: "Hold more than $10,000 in the wallet",
        icon: "Anchor",
        category: Category::Holding,
        tier: Tier::Platinum,
        points: 50,
        target: 10_000,
        rule: Rule::PortfolioValue(10_000.0),
    },
    Achievement {
        id: "trading-pro",
        title: "Pro Trader",
        description: "Complete 50 successful transactions",
        icon: "BarChart",
        category: Category::Transaction,
        tier: Tier::Gold,
        points: 60,
        target: 50,
        rule: Rule::CompletedTransactions(50),
    },
    Achievement {
        id: "early-adopter",
        title: "Early Adopter",
        description: "Joined during the first month after launch",
        icon: "Star",
        category: Category::Loyalty,
        tier: Tier::Gold,
        points: 100,
        target: 30,
        rule: Rule::RegisteredWithinDays(30),
    },
    Achievement {
        id: "educator",
        title: "Learner",
        description: "Completed every lesson on the platform",
        icon: "Lightbulb",
        category: Category::Education,
        tier: Tier::Bronze,
        points: 30,
        target: 10,
        rule: Rule::Manual,
    },
    Achievement {
        id: "referral-master",
        title: "Ambassador",
        description: "Invited 5 friends to join the platform",
        icon: "Users",
        category: Category::Referral,
        tier: Tier::Silver,
        points: 50,
        target: 5,
        rule: Rule::Manual,
    },
];

pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}
