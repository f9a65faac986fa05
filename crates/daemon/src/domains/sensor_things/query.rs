/// Collection filters the sync needs, rendered to OData by the HTTP store.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    NameEq(String),
    DescriptionEq(String),
    /// Things with a Datastream observing any of the named properties
    ObservedPropertyNameIn(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expand {
    /// Datastreams ordered by ID ascending, each with its Sensor ID
    Datastreams,
    /// Datastreams ordered by ID ascending, each with its newest Observation
    DatastreamsWithLatestObservation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderBy {
    IdAsc,
    IdDesc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub expand: Option<Expand>,
    pub order_by: Option<OrderBy>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
    pub count: bool,
}

/// OData string literal, single quotes doubled
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Filter {
    pub fn to_odata(&self) -> String {
        match self {
            Filter::NameEq(name) => format!("name eq {}", literal(name)),
            Filter::DescriptionEq(description) => {
                format!("description eq {}", literal(description))
            }
            Filter::ObservedPropertyNameIn(names) => names
                .iter()
                .map(|name| format!("Datastreams/ObservedProperty/name eq {}", literal(name)))
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

impl Expand {
    pub fn to_odata(self) -> &'static str {
        match self {
            Expand::Datastreams => "Datastreams($orderby=id asc;$expand=Sensor($select=id))",
            Expand::DatastreamsWithLatestObservation => {
                "Datastreams($orderby=id asc;$expand=Observations($orderby=id desc;$top=1))"
            }
        }
    }
}

impl OrderBy {
    pub fn to_odata(self) -> &'static str {
        match self {
            OrderBy::IdAsc => "id asc",
            OrderBy::IdDesc => "id desc",
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn expand(mut self, expand: Expand) -> Self {
        self.expand = Some(expand);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Query-string pairs, unencoded
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(filter) = &self.filter {
            params.push(("$filter", filter.to_odata()));
        }
        if let Some(expand) = self.expand {
            params.push(("$expand", expand.to_odata().to_string()));
        }
        if let Some(order_by) = self.order_by {
            params.push(("$orderby", order_by.to_odata().to_string()));
        }
        if let Some(top) = self.top {
            params.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip", skip.to_string()));
        }
        if self.count {
            params.push(("$count", String::from("true")));
        }
        params
    }
}
