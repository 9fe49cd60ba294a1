pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const STATS: &str = "📊";
    pub const DATABASE: &str = "🗄️";
    pub const EMPTY: &str = "∅";
}
