//! Tradable symbol universe and scan presets.
//!
//! The universe is the NSE futures & options stock list. Symbols are stored
//! exactly as the exchange lists them; the provider adds its own suffix.

use rfactor_common::config::ScanModeName;

/// Number of symbols covered by a quick scan.
pub const QUICK_SCAN_SIZE: usize = 50;

/// Reference symbols used to cross-check the scoring formula.
pub const TEST_SYMBOLS: &[&str] = &["TATAELXSI", "HDFCAMC", "SHRIRAMFIN"];

/// NSE F&O stock universe.
pub const FNO_UNIVERSE: &[&str] = &[
    "360ONE", "AARTIIND", "ABB", "ABBOTINDIA", "ABCAPITAL", "ACC", "ADANIENSOL",
    "ADANIENT", "ADANIGREEN", "ADANIPORTS", "ADANIPOWER", "ALKEM", "AMBERENTERP",
    "AMBUJACEM", "ANGELONE", "APOLLOHOSP", "APOLLOTYRE", "ASHOKLEY", "ASIANPAINT",
    "ASTRAL", "ATGL", "ATUL", "AUBANK", "AUROPHARMA", "AXISBANK", "BAJAJ-AUTO",
    "BAJAJFINSV", "BAJFINANCE", "BALKRISIND", "BANDHANBNK", "BANKBARODA", "BATAINDIA",
    "BEL", "BERGEPAINT", "BHARATFORG", "BHARTIARTL", "BHEL", "BIOCON", "BOSCHLTD", "BPCL",
    "BRITANNIA", "BSE", "BSOFT", "CANBK", "CANFINHOME", "CHAMBLFERT", "CHOLAFIN", "CIPLA",
    "COALINDIA", "COFORGE", "COLPAL", "CONCOR", "COROMANDEL", "CROMPTON", "CUB",
    "CUMMINSIND", "CYIENT", "DABUR", "DALBHARAT", "DEEPAKNTR", "DELHIVERY", "DIVISLAB",
    "DIXON", "DLF", "DMART", "DRREDDY", "EICHERMOT", "ESCORTS", "EXIDEIND", "FEDERALBNK",
    "GAIL", "GLENMARK", "GMRAIRPORT", "GMRINFRA", "GNFC", "GODREJCP", "GODREJPROP",
    "GRASIM", "GUJGASLTD", "HAL", "HAVELLS", "HCLTECH", "HDFCAMC", "HDFCBANK", "HDFCLIFE",
    "HEROMOTOCO", "HINDALCO", "HINDCOPPER", "HINDPETRO", "HINDUNILVR", "HINDZINC",
    "ICICIBANK", "ICICIGI", "ICICIPRULI", "IDEA", "IDFCFIRSTB", "IEX", "IGL", "INDHOTEL",
    "INDIAMART", "INDIANB", "INDIGO", "INDUSINDBK", "INDUSTOWER", "INFY", "IOC", "IPCALAB",
    "IRB", "IRCTC", "IRFC", "ITC", "JINDALSTEL", "JIOFIN", "JKCEMENT", "JSL", "JSWENERGY",
    "JSWSTEEL", "JUBLFOOD", "KAJARIACER", "KAYNES", "KEI", "KFINTECH", "KOTAKBANK",
    "KPITTECH", "LALPATHLAB", "LAURUSLABS", "LICHSGFIN", "LICI", "LTIM", "LT", "LTTS",
    "LUPIN", "M&M", "M&MFIN", "MANAPPURAM", "MARICO", "MARUTI", "MAXHEALTH", "MCX",
    "METROPOLIS", "MFSL", "MGL", "MOTHERSON", "MPHASIS", "MRF", "MUTHOOTFIN", "NATIONALUM",
    "NAUKRI", "NAVINFLUOR", "NESTLEIND", "NHPC", "NMDC", "NTPC", "OBEROIRLTY", "OFSS",
    "OIL", "ONGC", "PAGEIND", "PAYTM", "PEL", "PERSISTENT", "PETRONET", "PFC", "PGEL",
    "PIDILITIND", "PIIND", "PNB", "POLICYBZR", "POLYCAB", "POWERGRID", "PRESTIGE",
    "PVRINOX", "RAMCOCEM", "RBLBANK", "RECLTD", "RELIANCE", "SAIL", "SBICARD", "SBILIFE",
    "SBIN", "SHREECEM", "SHRIRAMFIN", "SIEMENS", "SJVN", "SONACOMS", "SONATSOFTW",
    "STARHEALTH", "SUNPHARMA", "SUNTV", "SYNGENE", "TATACHEM", "TATACOMM", "TATACONSUM",
    "TATAELXSI", "TATAMOTORS", "TATAPOWER", "TATASTEEL", "TCS", "TECHM", "TIINDIA",
    "TITAN", "TORNTPHARM", "TRENT", "TVSMOTOR", "UBL", "ULTRACEMCO", "UNIONBANK", "UPL",
    "VBL", "VEDL", "VOLTAS", "WIPRO", "YESBANK", "ZEEL", "ZOMATO", "ZYDUSLIFE",
];

/// Built-in universe as owned strings.
pub fn default_universe() -> Vec<String> {
    FNO_UNIVERSE.iter().map(|s| s.to_string()).collect()
}

/// Normalize user-supplied symbols: trim, upper-case, drop empties.
///
/// Order is preserved and duplicates are dropped after their first occurrence.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for raw in symbols {
        let symbol = raw.as_ref().trim().to_uppercase();
        if !symbol.is_empty() && !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

/// Which symbols a scan should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// The three reference symbols
    Test,
    /// The first [`QUICK_SCAN_SIZE`] symbols of the universe
    Quick,
    /// The whole universe
    Full,
    /// An explicit symbol list
    Custom(Vec<String>),
}

impl ScanMode {
    /// Build a custom mode from raw user input.
    pub fn custom<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Custom(normalize_symbols(symbols))
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Quick => "quick",
            Self::Full => "full",
            Self::Custom(_) => "custom",
        }
    }

    /// Resolve the ordered symbol list against a universe.
    pub fn symbols(&self, universe: &[String]) -> Vec<String> {
        match self {
            Self::Test => TEST_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            Self::Quick => universe.iter().take(QUICK_SCAN_SIZE).cloned().collect(),
            Self::Full => universe.to_vec(),
            Self::Custom(symbols) => symbols.clone(),
        }
    }
}

impl From<ScanModeName> for ScanMode {
    fn from(name: ScanModeName) -> Self {
        match name {
            ScanModeName::Test => Self::Test,
            ScanModeName::Quick => Self::Quick,
            ScanModeName::Full => Self::Full,
        }
    }
}
