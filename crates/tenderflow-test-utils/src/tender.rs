/// Three-line tender with a budget, a timeline, and one functional requirement.
pub const MINIMAL_TENDER: &str = "Budget: $100,000\n\
Timeline: 4 months\n\
The system must support barcode scanning.\n";

/// Tender covering every extraction category except compliance.
pub const SAMPLE_TENDER: &str = "REQUEST FOR PROPOSAL\n\
\n\
EXECUTIVE SUMMARY\n\
About: Northwind Logistics is a regional distributor operating twelve warehouses.\n\
Scope: Replace the legacy inventory tracking system with a web platform.\n\
\n\
1. Requirements\n\
The system must support barcode scanning.\n\
The system shall provide real-time stock dashboards.\n\
Users should be able to export reports to CSV.\n\
Performance: pages must load in under two seconds for 500 concurrent users.\n\
Security: all access requires single sign-on.\n\
\n\
2. Technical Environment\n\
Technology: Python services on Azure.\n\
Database: PostgreSQL.\n\
The current system exports nightly batch files; integration with the ERP is required.\n\
\n\
3. Timeline and Budget\n\
Deadline: go-live within 6 months.\n\
Budget: $250,000 including licences.\n\
\n\
Stakeholder: Head of Operations.\n\
Success criteria: stock accuracy above 99 percent.\n";
